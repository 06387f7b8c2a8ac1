//! Registry commands: Windows identity, DPI, renderer and raw edits.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand, ValueEnum};

use crate::commands::Session;
use crate::output::Output;
use crate::registry::{Reg, RegType, RegistryBundle};
use crate::wine::Wine;

#[derive(Debug, Args)]
pub struct WindowsArgs {
    /// Bottle name
    pub bottle: String,
    /// Version id (win10, win7, winxp, ...)
    pub version: String,
}

#[derive(Debug, Args)]
pub struct DpiArgs {
    /// Bottle name
    pub bottle: String,
    /// Dots per inch (48-480)
    pub dpi: u32,
}

#[derive(Debug, Args)]
pub struct RendererArgs {
    /// Bottle name
    pub bottle: String,
    /// gl, gdi or vulkan
    pub renderer: String,
}

#[derive(Debug, Args)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub action: RegistryAction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValueType {
    Sz,
    Dword,
    Binary,
    Expand,
    Multi,
}

impl ValueType {
    fn reg_type(self) -> Option<RegType> {
        match self {
            ValueType::Sz => None,
            ValueType::Dword => Some(RegType::Dword),
            ValueType::Binary => Some(RegType::Binary),
            ValueType::Expand => Some(RegType::Expand),
            ValueType::Multi => Some(RegType::Multi),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum RegistryAction {
    /// Import a bundle file (JSON or YAML) in one pass
    Import {
        /// Bottle name
        bottle: String,
        /// Bundle file
        file: PathBuf,
        /// Back up the hives first and print what changed
        #[arg(long)]
        diff: bool,
    },
    /// Set one value
    Add {
        /// Bottle name
        bottle: String,
        key: String,
        value: String,
        data: String,
        #[arg(short = 't', long = "type", value_enum, default_value = "sz")]
        kind: ValueType,
    },
    /// Delete one value
    Remove {
        /// Bottle name
        bottle: String,
        key: String,
        value: String,
    },
}

pub fn windows(args: WindowsArgs, session: &Session) -> Result<()> {
    let config = session.bottle(&args.bottle)?;
    session.emit(session.manager.set_windows(&config, &args.version), |config| {
        Output::success(format!("{} now reports {}", config.name, config.windows));
    })
}

pub fn dpi(args: DpiArgs, session: &Session) -> Result<()> {
    let config = session.bottle(&args.bottle)?;
    session.emit(session.manager.set_dpi(&config, args.dpi), |config| {
        Output::success(format!("{} DPI set to {}", config.name, config.parameters.dpi));
    })
}

pub fn renderer(args: RendererArgs, session: &Session) -> Result<()> {
    let config = session.bottle(&args.bottle)?;
    session.emit(session.manager.set_renderer(&config, &args.renderer), |config| {
        Output::success(format!(
            "{} renderer set to {}",
            config.name, config.parameters.renderer
        ));
    })
}

/// Read a bundle from JSON, or YAML when the file is not JSON.
pub fn load_bundle(path: &Path) -> Result<RegistryBundle> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str(&content) {
        Ok(bundle) => Ok(bundle),
        Err(_) => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse bundle {}", path.display())),
    }
}

pub fn run(args: RegistryArgs, session: &Session) -> Result<()> {
    let reg = Reg::new(Wine::new(session.manager.context().clone()));
    match args.action {
        RegistryAction::Import { bottle, file, diff } => {
            let config = session.bottle(&bottle)?;
            let bundle = load_bundle(&file)?;
            if diff {
                return session.emit(reg.patch_with_backup(&config, &bundle), |diff| {
                    if diff.is_empty() {
                        Output::info("No values changed");
                    }
                    for path in &diff.added {
                        Output::step(format!("+ {path}"));
                    }
                    for path in &diff.changed {
                        Output::step(format!("~ {path}"));
                    }
                    for path in &diff.removed {
                        Output::step(format!("- {path}"));
                    }
                });
            }
            session.emit(session.manager.import_bundle(&config, &bundle), |_| {
                Output::success(format!("Imported {} values", bundle.len()));
            })
        }
        RegistryAction::Add {
            bottle,
            key,
            value,
            data,
            kind,
        } => {
            let config = session.bottle(&bottle)?;
            session.emit(reg.add(&config, &key, &value, &data, kind.reg_type()), |_| {
                Output::success(format!("Set {key}\\{value}"));
            })
        }
        RegistryAction::Remove { bottle, key, value } => {
            let config = session.bottle(&bottle)?;
            session.emit(reg.remove(&config, &key, &value), |_| {
                Output::success(format!("Removed {key}\\{value}"));
            })
        }
    }
}
