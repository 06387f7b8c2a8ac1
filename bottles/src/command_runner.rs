//! Abstraction over external command execution for testability.
//!
//! Every invocation of the compatibility engine (`wine`, `wineserver`,
//! `wineboot`, `regedit`) goes through the [`CommandRunner`] trait, stored as
//! `Arc<dyn CommandRunner>` in the shared [`Context`](crate::context::Context).
//!
//! [`RealCommandRunner`] delegates to [`std::process::Command`].
//! [`MockCommandRunner`] records every call and returns canned exit codes, so
//! lifecycle code can be tested without a wine installation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{BottlesError, Result};

pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its full output (stdout + stderr + exit status).
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output>;

    /// Run a command and return only its exit status (inherits stdio).
    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus>;
}

/// Options for command execution.
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandOptions {
    /// Add an environment variable, replacing an earlier value for the same name.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program];
    parts.extend_from_slice(args);
    shlex::try_join(parts.iter().copied()).unwrap_or_else(|_| parts.join(" "))
}

/// Production implementation that delegates to [`std::process::Command`].
pub struct RealCommandRunner;

impl RealCommandRunner {
    fn command(program: &str, args: &[&str], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &options.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(program: &str, args: &[&str], err: std::io::Error) -> BottlesError {
        BottlesError::CommandFailed {
            command: display_command(program, args),
            status: format!("failed to start: {err}"),
        }
    }
}

impl CommandRunner for RealCommandRunner {
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output> {
        debug!(command = %display_command(program, args), "Running");
        Self::command(program, args, options)
            .output()
            .map_err(|err| Self::spawn_error(program, args, err))
    }

    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus> {
        debug!(command = %display_command(program, args), "Running");
        Self::command(program, args, options)
            .status()
            .map_err(|err| Self::spawn_error(program, args, err))
    }
}

/// A command invocation captured by [`MockCommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl RecordedCall {
    /// File name of the program (`/runners/x/bin/wine` -> `wine`).
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True if the first argument (the wine subprogram) or the program itself matches.
    pub fn invokes(&self, name: &str) -> bool {
        self.program_name() == name || self.args.first().is_some_and(|a| a == name)
    }

    pub fn command_line(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        display_command(self.program_name(), &args)
    }
}

type Hook = Box<dyn Fn(&RecordedCall) + Send + Sync>;

/// Test double that records calls instead of spawning processes.
///
/// Every call succeeds with exit code 0 unless an exit code was registered
/// for the invoked program (or wine subprogram) with [`MockCommandRunner::exit_code`].
#[derive(Default)]
pub struct MockCommandRunner {
    calls: Mutex<Vec<RecordedCall>>,
    exit_codes: Mutex<HashMap<String, i32>>,
    hooks: Mutex<Vec<Hook>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `name` exit with `code`.
    pub fn exit_code(&self, name: impl Into<String>, code: i32) {
        if let Ok(mut codes) = self.exit_codes.lock() {
            codes.insert(name.into(), code);
        }
    }

    /// Run `hook` on every recorded call, before the exit status is returned.
    pub fn on_call(&self, hook: impl Fn(&RecordedCall) + Send + Sync + 'static) {
        if let Ok(mut hooks) = self.hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Rendered command lines of every call, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::command_line).collect()
    }

    fn record(&self, program: &str, args: &[&str], options: &CommandOptions) -> ExitStatus {
        let call = RecordedCall {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: options.env.clone(),
        };
        if let Ok(hooks) = self.hooks.lock() {
            for hook in hooks.iter() {
                hook(&call);
            }
        }
        let code = self
            .exit_codes
            .lock()
            .ok()
            .and_then(|codes| {
                codes
                    .get(call.program_name())
                    .or_else(|| call.args.first().and_then(|a| codes.get(a)))
                    .copied()
            })
            .unwrap_or(0);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        exit_status(code)
    }
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

impl CommandRunner for MockCommandRunner {
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output> {
        let status = self.record(program, args, options);
        Ok(Output {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus> {
        Ok(self.record(program, args, options))
    }
}
