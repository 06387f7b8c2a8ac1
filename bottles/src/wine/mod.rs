//! Invocations of the compatibility engine for one bottle.
//!
//! Every command runs with `WINEPREFIX` pointing at the bottle and with the
//! binaries of the bottle's runner. Runners live under
//! `<data>/runners/<id>/bin`; ids starting with `sys-` use whatever is on
//! `PATH`.

pub mod boot;
pub mod server;

use std::path::PathBuf;
use std::process::Output;

use tracing::debug;

use crate::command_runner::{CommandOptions, display_command};
use crate::components::ComponentKind;
use crate::config::BottleConfig;
use crate::context::Context;
use crate::error::{BottlesError, Result};

pub use boot::BootAction;
pub use server::WineServer;

#[derive(Debug, Clone)]
pub struct Wine {
    ctx: Context,
}

impl Wine {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Prefix directory of a bottle.
    pub fn prefix(&self, config: &BottleConfig) -> PathBuf {
        self.ctx.paths.bottle_path(config)
    }

    /// Path (or bare name for system runners) of a runner binary.
    pub fn binary(&self, runner: &str, name: &str) -> Result<String> {
        if runner.starts_with("sys-") {
            return Ok(name.to_string());
        }
        let runner_dir = self.ctx.paths.component_dir(ComponentKind::Runner).join(runner);
        if runner.is_empty() || !runner_dir.is_dir() {
            return Err(BottlesError::RunnerNotFound(runner.to_string()));
        }
        Ok(runner_dir.join("bin").join(name).to_string_lossy().into_owned())
    }

    /// Environment shared by every command against a bottle.
    pub fn options(&self, config: &BottleConfig) -> CommandOptions {
        let prefix = self.prefix(config);
        CommandOptions {
            cwd: Some(prefix.clone()),
            env: Vec::new(),
        }
        .with_env("WINEPREFIX", prefix.to_string_lossy())
        .with_env("WINEDEBUG", "-all")
    }

    /// Run `wine <args>` and fail on a non-zero exit.
    pub fn run(&self, config: &BottleConfig, args: &[&str]) -> Result<()> {
        self.run_with(config, args, self.options(config))
    }

    pub fn run_with(&self, config: &BottleConfig, args: &[&str], options: CommandOptions) -> Result<()> {
        let program = self.binary(&config.runner, "wine")?;
        self.status(&program, args, &options)
    }

    /// Run a runner binary other than `wine` itself, e.g. `wineserver`.
    pub fn run_tool(&self, config: &BottleConfig, tool: &str, args: &[&str]) -> Result<()> {
        let program = self.binary(&config.runner, tool)?;
        self.status(&program, args, &self.options(config))
    }

    /// Run a runner binary and return its raw output without judging the exit code.
    pub fn output_tool(&self, config: &BottleConfig, tool: &str, args: &[&str]) -> Result<Output> {
        let program = self.binary(&config.runner, tool)?;
        self.ctx.runner.run_output(&program, args, &self.options(config))
    }

    fn status(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<()> {
        let status = self.ctx.runner.run_status(program, args, options)?;
        debug!(command = %display_command(program, args), %status, "Finished");
        if !status.success() {
            return Err(BottlesError::CommandFailed {
                command: display_command(program, args),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
