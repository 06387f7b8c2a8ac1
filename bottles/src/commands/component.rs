//! DLL component commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::commands::Session;
use crate::components::{ComponentKind, DllComponentKind, InstallOptions};
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ComponentArgs {
    #[command(subcommand)]
    pub action: ComponentAction,
}

#[derive(Debug, Subcommand)]
pub enum ComponentAction {
    /// List locally installed component versions
    List,
    /// Enable a component in a bottle and install its DLLs
    Enable {
        /// Bottle name
        bottle: String,
        /// dxvk, vkd3d, nvapi or latencyflex
        kind: DllComponentKind,
    },
    /// Disable a component and restore the original DLLs
    Disable {
        /// Bottle name
        bottle: String,
        /// dxvk, vkd3d, nvapi or latencyflex
        kind: DllComponentKind,
    },
    /// Install (or remove) a specific component version without toggling it
    Install {
        /// Bottle name
        bottle: String,
        /// dxvk, vkd3d, nvapi or latencyflex
        kind: DllComponentKind,
        /// Version to install (defaults to the one recorded on the bottle)
        #[arg(long)]
        version: Option<String>,
        /// Remove instead of install
        #[arg(long)]
        remove: bool,
        /// Only rewrite DLL overrides, leave files alone
        #[arg(long)]
        overrides_only: bool,
        /// DLLs to leave untouched (file or base name), repeatable
        #[arg(long)]
        exclude: Vec<String>,
    },
}

pub fn run(args: ComponentArgs, session: &Session) -> Result<()> {
    match args.action {
        ComponentAction::List => {
            let snapshot = session.manager.components();
            session.emit(Ok(snapshot.as_ref().clone()), |snapshot| {
                for kind in ComponentKind::ALL {
                    let versions = snapshot.versions(kind);
                    if versions.is_empty() {
                        continue;
                    }
                    Output::subheader(kind.as_str());
                    for version in versions {
                        Output::list_item(version);
                    }
                }
            })
        }
        ComponentAction::Enable { bottle, kind } => toggle(session, &bottle, kind, true),
        ComponentAction::Disable { bottle, kind } => toggle(session, &bottle, kind, false),
        ComponentAction::Install {
            bottle,
            kind,
            version,
            remove,
            overrides_only,
            exclude,
        } => {
            let config = session.bottle(&bottle)?;
            let options = InstallOptions {
                overrides_only,
                exclude,
            };
            let report =
                session
                    .manager
                    .install_dll_component(&config, kind, remove, version.as_deref(), &options);
            session.emit(report, |report| {
                let verb = if remove { "Removed" } else { "Installed" };
                Output::success(format!("{verb} {} {}", report.kind, report.version));
                Output::kv("Files", report.touched.len().to_string());
                Output::kv("Overrides", report.overrides.len().to_string());
                if !report.missing.is_empty() {
                    Output::warning(format!("Missing in package: {}", report.missing.join(", ")));
                }
            })
        }
    }
}

fn toggle(session: &Session, bottle: &str, kind: DllComponentKind, enabled: bool) -> Result<()> {
    let config = session.bottle(bottle)?;
    session.emit(session.manager.toggle_component(&config, kind, enabled), |config| {
        let state = if enabled { "enabled" } else { "disabled" };
        let version = config.component_version(kind).unwrap_or("-");
        Output::success(format!("{kind} {version} {state} in {}", config.name));
    })
}
