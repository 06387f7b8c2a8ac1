//! CLI argument definitions for bottles.
//!
//! This module contains the clap-derived `Cli` and `Commands` types.
//! Separated from `main.rs` so integration tests and other front-ends can
//! reference these types.

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "bottles")]
#[command(about = "Bottles - manage Windows-compatible runtime environments")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print a JSON status envelope instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List bottles
    #[command(alias = "ls")]
    List,

    /// Show one bottle's configuration
    Show(commands::bottle::ShowArgs),

    /// Create a new bottle
    Create(commands::bottle::CreateArgs),

    /// Delete a bottle and its prefix
    #[command(alias = "rm")]
    Delete(commands::bottle::DeleteArgs),

    /// Rebuild the configuration of a prefix whose bottle.json was lost
    Repair(commands::bottle::RepairArgs),

    /// Switch a bottle to another runner
    Runner(commands::runner::RunnerArgs),

    /// Enable, disable or reinstall DLL components (dxvk, vkd3d, nvapi, latencyflex)
    Component(commands::component::ComponentArgs),

    /// Change the Windows version reported inside a bottle
    Windows(commands::registry::WindowsArgs),

    /// Set the screen resolution (DPI) of a bottle
    Dpi(commands::registry::DpiArgs),

    /// Set the Direct3D renderer of a bottle
    Renderer(commands::registry::RendererArgs),

    /// Edit bottle.json values
    Config(commands::config::ConfigArgs),

    /// Edit a bottle's registry
    #[command(alias = "reg")]
    Registry(commands::registry::RegistryArgs),

    /// Manage cached bottle templates
    Template(commands::template::TemplateArgs),

    /// Generate JSON schemas for configuration files
    Schema(commands::schema::SchemaArgs),
}
