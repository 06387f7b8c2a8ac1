//! Output helpers for consistent CLI output.
//!
//! Human-readable messages use colored, cargo-like prefixes. With `--json`
//! every command prints a single [`OpResult`] envelope instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use bottles::output::Output;
//!
//! Output::success("Created bottle Games");
//! Output::warning("No dxvk version installed");
//!
//! let spinner = Output::spinner("Creating bottle...");
//! // ... do work ...
//! spinner.finish_success("Created bottle Games");
//! ```

use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::result::OpResult;

/// Standard output helper for consistent CLI formatting.
pub struct Output;

impl Output {
    /// Example: `✓ Created bottle Games`
    pub fn success(msg: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), msg.as_ref());
    }

    /// Print an error message with a red X to stderr.
    pub fn error(msg: impl AsRef<str>) {
        eprintln!("{} {}", "✗".red().bold(), msg.as_ref().red());
    }

    pub fn warning(msg: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow(), msg.as_ref());
    }

    /// Example: `→ Waiting for registry hives...`
    pub fn info(msg: impl AsRef<str>) {
        println!("{} {}", "→".cyan(), msg.as_ref().dimmed());
    }

    pub fn step(msg: impl AsRef<str>) {
        println!("  {} {}", "•".cyan(), msg.as_ref());
    }

    pub fn header(msg: impl AsRef<str>) {
        println!("\n{}\n", msg.as_ref().bold().cyan());
    }

    /// Example: `dxvk`
    pub fn subheader(msg: impl AsRef<str>) {
        println!("{}", msg.as_ref().bold());
    }

    pub fn list_item(msg: impl AsRef<str>) {
        println!("  {}", msg.as_ref());
    }

    /// Print a key-value pair with alignment.
    ///
    /// Example: `  Runner:        soda-9.0-1`
    pub fn kv(key: impl AsRef<str>, value: impl AsRef<str>) {
        println!("  {:<14} {}", format!("{}:", key.as_ref()).cyan(), value.as_ref());
    }

    pub fn hint(msg: impl AsRef<str>) {
        println!("  {} {}", "→".cyan(), msg.as_ref());
    }

    /// Print a `--json` envelope on stdout.
    pub fn json(result: &OpResult) {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{text}"),
            Err(err) => Self::error(format!("Failed to render JSON: {err}")),
        }
    }

    /// Create a spinner for long-running operations.
    ///
    /// Hidden when stderr is not a terminal, so scripted runs stay quiet.
    pub fn spinner(msg: impl Into<Cow<'static, str>>) -> Spinner {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(80));
        Spinner(pb)
    }
}

/// Created via `Output::spinner()`.
pub struct Spinner(ProgressBar);

impl Spinner {
    pub fn set_message(&self, msg: impl Into<Cow<'static, str>>) {
        self.0.set_message(msg);
    }

    pub fn finish_success(self, msg: impl AsRef<str>) {
        self.0
            .finish_with_message(format!("{} {}", "✓".green().bold(), msg.as_ref()));
    }

    pub fn finish_error(self, msg: impl AsRef<str>) {
        self.0
            .finish_with_message(format!("{} {}", "✗".red().bold(), msg.as_ref()));
    }

    /// Finish and clear the line (no final message).
    pub fn finish_clear(self) {
        self.0.finish_and_clear();
    }
}
