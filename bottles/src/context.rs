//! Shared handles every bottle operation needs.
//!
//! A [`Context`] bundles the data-directory layout, the command runner and
//! the hive wait policy. It is cheap to clone and carries no per-bottle
//! state, so two operations on distinct bottles can each hold one.

use std::sync::Arc;

use crate::command_runner::{CommandRunner, RealCommandRunner};
use crate::registry::HiveWait;
use crate::settings::{BottlesPaths, Settings};

#[derive(Clone)]
pub struct Context {
    pub paths: BottlesPaths,
    pub runner: Arc<dyn CommandRunner>,
    pub hive_wait: HiveWait,
    /// Running inside a sandbox (flatpak) where prefix symlinks could escape.
    pub sandboxed: bool,
    /// Offer the system wine as a runner.
    pub use_system_wine: bool,
}

impl Context {
    pub fn new(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            paths: settings.paths(),
            runner,
            hive_wait: settings.hive_wait(),
            sandboxed: settings.sandboxed || detect_sandbox(),
            use_system_wine: settings.use_system_wine,
        }
    }

    /// Context backed by real processes.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings, Arc::new(RealCommandRunner))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("paths", &self.paths)
            .field("hive_wait", &self.hive_wait)
            .field("sandboxed", &self.sandboxed)
            .finish_non_exhaustive()
    }
}

/// Detect whether we run inside a flatpak sandbox.
pub fn detect_sandbox() -> bool {
    std::env::var_os("FLATPAK_ID").is_some() || std::path::Path::new("/.flatpak-info").exists()
}
