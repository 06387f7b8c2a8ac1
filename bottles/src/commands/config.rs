//! Config editing commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::commands::Session;
use crate::config::Update;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print a bottle's bottle.json
    Show {
        /// Bottle name
        bottle: String,
    },
    /// Set a value
    ///
    /// The value is parsed as JSON when possible (`true`, `96`, `["a"]`) and
    /// stored as a string otherwise.
    Set {
        /// Bottle name
        bottle: String,
        key: String,
        value: String,
        /// Nested object to write into (e.g. `parameters`)
        #[arg(short, long)]
        scope: Option<String>,
        /// Keep existing values by writing to `<key>_<n>` instead
        #[arg(long)]
        fallback: bool,
    },
    /// Remove a value
    Remove {
        /// Bottle name
        bottle: String,
        key: String,
        /// Nested object to remove from
        #[arg(short, long)]
        scope: Option<String>,
    },
}

/// Parse a command-line value: JSON literal if it is one, string otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn run(args: ConfigArgs, session: &Session) -> Result<()> {
    match args.action {
        ConfigAction::Show { bottle } => {
            let config = session.bottle(&bottle)?;
            if session.json {
                return session.emit(Ok(config), |_| {});
            }
            println!("{}", config.to_pretty_json()?);
            Ok(())
        }
        ConfigAction::Set {
            bottle,
            key,
            value,
            scope,
            fallback,
        } => {
            let config = session.bottle(&bottle)?;
            let mut update = Update::set(&key, parse_value(&value));
            if let Some(scope) = scope {
                update = update.scope(scope);
            }
            if fallback {
                update = update.fallback();
            }
            session.emit(session.manager.update_config(&config, update), |_| {
                Output::success(format!("Set {key} = {value}"));
            })
        }
        ConfigAction::Remove { bottle, key, scope } => {
            let config = session.bottle(&bottle)?;
            let mut update = Update::remove(&key);
            if let Some(scope) = scope {
                update = update.scope(scope);
            }
            session.emit(session.manager.update_config(&config, update), |_| {
                Output::success(format!("Removed {key}"));
            })
        }
    }
}
