//! Schema generation command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use schemars::schema_for;
use serde_json::Value;

use crate::config::BottleConfig;
use crate::manager::EnvironmentRecipe;
use crate::settings::Settings;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub action: SchemaAction,
}

#[derive(Debug, Subcommand)]
pub enum SchemaAction {
    /// Generate JSON schemas for all configuration files
    Generate {
        /// Output directory (if not specified, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List available schema types
    List,
}

struct SchemaInfo {
    name: &'static str,
    filename: &'static str,
    description: &'static str,
}

const SCHEMAS: &[SchemaInfo] = &[
    SchemaInfo {
        name: "BottleConfig",
        filename: "bottle.schema.json",
        description: "The bottle.json document stored in every bottle",
    },
    SchemaInfo {
        name: "Settings",
        filename: "settings.schema.json",
        description: "User settings (~/.config/bottles/settings.json)",
    },
    SchemaInfo {
        name: "EnvironmentRecipe",
        filename: "environment.schema.json",
        description: "A custom environment recipe passed to `create --recipe`",
    },
];

/// Generate all schemas as (filename, schema) pairs.
fn generate_all_schemas() -> Result<Vec<(&'static str, Value)>> {
    Ok(vec![
        ("bottle.schema.json", serde_json::to_value(schema_for!(BottleConfig))?),
        ("settings.schema.json", serde_json::to_value(schema_for!(Settings))?),
        (
            "environment.schema.json",
            serde_json::to_value(schema_for!(EnvironmentRecipe))?,
        ),
    ])
}

pub fn run(args: SchemaArgs) -> Result<()> {
    match args.action {
        SchemaAction::Generate { output } => {
            let schemas = generate_all_schemas()?;

            match output {
                Some(dir) => {
                    fs::create_dir_all(&dir)
                        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

                    for (filename, schema) in schemas {
                        let path = dir.join(filename);
                        fs::write(&path, serde_json::to_string_pretty(&schema)?)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Wrote {}", path.display());
                    }
                }
                None => {
                    let mut combined = serde_json::Map::new();
                    for (filename, schema) in schemas {
                        let name = filename.strip_suffix(".schema.json").unwrap_or(filename);
                        combined.insert(name.to_string(), schema);
                    }
                    println!("{}", serde_json::to_string_pretty(&combined)?);
                }
            }
        }
        SchemaAction::List => {
            println!("Available schema types:\n");
            for info in SCHEMAS {
                println!("  {} ({})", info.name, info.filename);
                println!("    {}\n", info.description);
            }
        }
    }

    Ok(())
}
