//! Template cache commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::commands::Session;
use crate::config::{Arch, Environment};
use crate::output::Output;

#[derive(Debug, Args)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    /// List cached templates
    List,
    /// Drop a cached template so the next bottle is built from scratch
    Remove {
        /// gaming or application
        environment: Environment,
        /// win32 or win64
        #[arg(default_value = "win64")]
        arch: Arch,
    },
}

pub fn run(args: TemplateArgs, session: &Session) -> Result<()> {
    let templates = session.manager.templates();
    match args.action {
        TemplateAction::List => session.emit(templates.list(), |entries| {
            if entries.is_empty() {
                Output::info("No cached templates");
                return;
            }
            for entry in entries {
                Output::kv(
                    &entry.environment,
                    format!("{} ({})", entry.file, entry.created_at.format("%Y-%m-%d %H:%M")),
                );
            }
        }),
        TemplateAction::Remove { environment, arch } => {
            session.emit(templates.remove(environment, arch), |removed| {
                if *removed {
                    Output::success(format!("Removed template {environment}-{arch}"));
                } else {
                    Output::info(format!("No template for {environment}-{arch}"));
                }
            })
        }
    }
}
