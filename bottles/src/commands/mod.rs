//! CLI command implementations.

pub mod bottle;
pub mod component;
pub mod config;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod template;

use anyhow::Result;
use serde::Serialize;

use crate::error::BottlesError;
use crate::manager::Manager;
use crate::output::Output;
use crate::result::OpResult;

/// What every command handler gets: the manager and the output mode.
pub struct Session {
    pub manager: Manager,
    pub json: bool,
}

impl Session {
    pub fn new(manager: Manager, json: bool) -> Self {
        Self { manager, json }
    }

    /// Report the outcome of a library call.
    ///
    /// In JSON mode the result is printed as an [`OpResult`] envelope;
    /// otherwise `human` renders the success value. Failures are returned
    /// either way so the process exits non-zero.
    pub fn emit<T: Serialize>(
        &self,
        result: Result<T, BottlesError>,
        human: impl FnOnce(&T),
    ) -> Result<()> {
        if self.json {
            let envelope = match &result {
                Ok(value) => OpResult::ok(value),
                Err(err) => OpResult::failed(err.to_string()),
            };
            Output::json(&envelope);
        }
        let value = result?;
        if !self.json {
            human(&value);
        }
        Ok(())
    }

    /// Look a bottle up by name, reporting failure through [`Session::emit`].
    pub fn bottle(&self, name: &str) -> Result<crate::config::BottleConfig> {
        match self.manager.find_bottle(name) {
            Ok(config) => Ok(config),
            Err(err) => {
                if self.json {
                    Output::json(&OpResult::failed(err.to_string()));
                }
                Err(err.into())
            }
        }
    }
}
