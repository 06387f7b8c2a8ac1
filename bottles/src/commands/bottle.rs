//! Bottle lifecycle commands: list, show, create, delete, repair.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::commands::Session;
use crate::config::{Arch, Environment};
use crate::manager::BottleRequest;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Bottle name
    pub bottle: String,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Display name of the new bottle
    pub name: String,

    /// Environment: gaming, application or custom
    #[arg(short, long, default_value = "custom")]
    pub environment: Environment,

    /// Architecture: win32 or win64
    #[arg(short, long, default_value = "win64")]
    pub arch: Arch,

    /// Runner to use (defaults to the newest installed one)
    #[arg(short, long)]
    pub runner: Option<String>,

    /// DXVK version (defaults to the newest installed one)
    #[arg(long)]
    pub dxvk: Option<String>,

    /// VKD3D version (defaults to the newest installed one)
    #[arg(long)]
    pub vkd3d: Option<String>,

    /// DXVK-NVAPI version (defaults to the newest installed one)
    #[arg(long)]
    pub nvapi: Option<String>,

    /// LatencyFleX version (defaults to the newest installed one)
    #[arg(long)]
    pub latencyflex: Option<String>,

    /// Create the bottle in this directory instead of the bottles dir
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// YAML recipe to use instead of the environment's built-in one
    #[arg(long)]
    pub recipe: Option<PathBuf>,

    /// Seed a versioning state after creation
    #[arg(long)]
    pub versioning: bool,

    /// Run programs of this bottle sandboxed
    #[arg(long)]
    pub sandbox: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Bottle name
    pub bottle: String,
}

#[derive(Debug, Args)]
pub struct RepairArgs {
    /// Directory of the broken prefix
    pub path: PathBuf,
}

pub fn list(session: &Session) -> Result<()> {
    session.emit(session.manager.list_bottles(), |bottles| {
        if bottles.is_empty() {
            Output::info("No bottles found");
            Output::hint("Create one with: bottles create <name>");
            return;
        }
        Output::header(format!("Bottles ({})", bottles.len()));
        for bottle in bottles {
            Output::list_item(format!(
                "{:<24} {:<12} {:<6} {}",
                bottle.name, bottle.environment, bottle.arch, bottle.runner
            ));
        }
    })
}

pub fn show(args: ShowArgs, session: &Session) -> Result<()> {
    let config = session.bottle(&args.bottle)?;
    session.emit(Ok(config), |config| {
        Output::header(&config.name);
        Output::kv("Path", session.manager.prefix(config).display().to_string());
        Output::kv("Environment", config.environment.as_str());
        Output::kv("Arch", config.arch.as_str());
        Output::kv("Runner", &config.runner);
        Output::kv("Windows", &config.windows);
        for kind in config.enabled_components() {
            Output::kv(kind.as_str(), config.component_version(kind).unwrap_or("(none)"));
        }
        if !config.installed_dependencies.is_empty() {
            Output::kv("Dependencies", config.installed_dependencies.join(", "));
        }
    })
}

pub fn create(args: CreateArgs, session: &mut Session) -> Result<()> {
    let request = BottleRequest {
        name: args.name,
        environment: args.environment,
        arch: args.arch,
        runner: args.runner,
        dxvk: args.dxvk,
        vkd3d: args.vkd3d,
        nvapi: args.nvapi,
        latencyflex: args.latencyflex,
        custom_path: args.path,
        recipe: args.recipe,
        versioning: args.versioning,
        sandbox: args.sandbox,
    };

    let spinner = (!session.json).then(|| Output::spinner(format!("Creating {}...", request.name)));
    let result = session.manager.create_bottle(&request);
    if let Some(spinner) = spinner {
        match &result {
            Ok(created) => spinner.finish_success(format!("Created bottle {}", created.config.name)),
            Err(_) => spinner.finish_error(format!("Failed to create {}", request.name)),
        }
    }

    let manager = &session.manager;
    session.emit(result, |created| {
        Output::kv("Path", manager.prefix(&created.config).display().to_string());
        Output::kv("Runner", &created.config.runner);
        for stage in &created.stages {
            Output::step(stage.to_string());
        }
    })
}

pub fn delete(args: DeleteArgs, session: &Session) -> Result<()> {
    let config = session.bottle(&args.bottle)?;
    session.emit(session.manager.delete_bottle(&config), |_| {
        Output::success(format!("Deleted bottle {}", config.name));
    })
}

pub fn repair(args: RepairArgs, session: &Session) -> Result<()> {
    session.emit(session.manager.repair_bottle(&args.path), |config| {
        Output::success(format!("Repaired bottle {}", config.name));
        Output::warning("Previous settings could not be recovered");
        Output::kv("Runner", &config.runner);
        Output::kv("Arch", config.arch.as_str());
    })
}
