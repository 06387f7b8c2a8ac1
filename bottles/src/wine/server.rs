//! `wineserver` control.
//!
//! Failing to start `wineserver` (no runner, binary missing) means there is
//! no server to stop, so those failures are logged and treated as success.

use tracing::{debug, warn};

use crate::config::BottleConfig;
use crate::error::{BottlesError, Result};
use crate::external::RuntimeServer;
use crate::wine::Wine;

#[derive(Debug, Clone)]
pub struct WineServer {
    wine: Wine,
}

impl WineServer {
    pub fn new(wine: Wine) -> Self {
        Self { wine }
    }

    fn signal(&self, config: &BottleConfig, args: &[&str]) -> Result<()> {
        match self.wine.run_tool(config, "wineserver", args) {
            Ok(()) => Ok(()),
            Err(BottlesError::RunnerNotFound(runner)) => {
                warn!(bottle = %config.name, %runner, "Runner missing, no server to signal");
                Ok(())
            }
            Err(BottlesError::CommandFailed { command, status }) => {
                // wineserver -k exits non-zero when no server is running
                debug!(%command, %status, "wineserver did not succeed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl RuntimeServer for WineServer {
    fn kill(&self, config: &BottleConfig) -> Result<()> {
        self.signal(config, &["-k"])
    }

    fn wait(&self, config: &BottleConfig) -> Result<()> {
        self.signal(config, &["-w"])
    }

    /// `wineserver -k0` sends no signal and succeeds only if a server answers.
    fn is_alive(&self, config: &BottleConfig) -> bool {
        match self.wine.output_tool(config, "wineserver", &["-k0"]) {
            Ok(output) => output.status.success(),
            Err(err) => {
                debug!(error = %err, "wineserver liveness check failed");
                false
            }
        }
    }

    fn force_kill(&self, config: &BottleConfig) -> Result<()> {
        self.signal(config, &["-k9"])
    }
}
