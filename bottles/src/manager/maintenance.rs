//! Repairing broken bottles and switching runners.

use std::path::Path;

use tracing::{info, warn};

use crate::components::{ComponentKind, InstallOptions};
use crate::config::{Arch, BottleConfig, Environment, Update};
use crate::error::{BottlesError, Result};
use crate::manager::Manager;
use crate::wine::BootAction;

impl Manager {
    /// Rebuild a lost config for the prefix at `path`.
    ///
    /// Everything the old config recorded is gone; the new one uses the
    /// newest runner and the custom environment. The architecture is read
    /// back from the prefix layout.
    pub fn repair_bottle(&self, path: &Path) -> Result<BottleConfig> {
        if !path.is_dir() {
            return Err(BottlesError::BottleNotFound(path.display().to_string()));
        }
        let runner = self
            .components
            .latest(ComponentKind::Runner)
            .ok_or_else(|| BottlesError::RunnerNotFound("no runner installed".to_string()))?
            .to_string();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| BottlesError::InvalidValue {
                key: "path".to_string(),
                message: format!("{} has no directory name", path.display()),
            })?
            .to_string();

        let arch = detect_arch(path);
        let (stored, custom_path) = if path.parent() == Some(self.ctx.paths.bottles.as_path()) {
            (name.clone(), false)
        } else {
            (path.to_string_lossy().into_owned(), true)
        };
        let mut config = BottleConfig::new(name, stored, arch, runner);
        config.custom_path = custom_path;
        config.environment = Environment::Custom;
        self.store.save(&config)?;
        warn!(bottle = %config.name, %arch, "Bottle config rebuilt; previous settings are lost");

        self.wine.wineboot(&config, BootAction::Update)?;
        Ok(config)
    }

    /// Switch a bottle to another runner.
    ///
    /// The old server is stopped first (escalating to a forced kill when it
    /// refuses), then the prefix is updated and DLL overrides of enabled
    /// components are rewritten for the new runner.
    pub fn runner_update(&self, config: &BottleConfig, runner: &str) -> Result<BottleConfig> {
        self.require_runner(runner)?;
        self.stop_server(config)?;

        let config = self.store.update(config, Update::set("runner", runner))?;
        self.wine.wineboot(&config, BootAction::Update)?;

        let options = InstallOptions {
            overrides_only: true,
            ..Default::default()
        };
        for kind in config.enabled_components() {
            if config.component_version(kind).is_none() {
                continue;
            }
            self.install_dll_component(&config, kind, false, None, &options)?;
        }
        info!(bottle = %config.name, %runner, "Runner changed");
        Ok(config)
    }

    fn stop_server(&self, config: &BottleConfig) -> Result<()> {
        self.server.kill(config)?;
        self.server.wait(config)?;
        if !self.server.is_alive(config) {
            return Ok(());
        }
        if let Err(err) = self.wine.wineboot(config, BootAction::Kill) {
            warn!(bottle = %config.name, error = %err, "wineboot -k failed");
        }
        if self.server.is_alive(config) {
            warn!(bottle = %config.name, "Server still running, forcing kill");
            self.server.force_kill(config)?;
        }
        Ok(())
    }
}

/// A 64-bit prefix carries a `syswow64` directory.
pub fn detect_arch(prefix: &Path) -> Arch {
    if prefix.join("drive_c/windows/syswow64").is_dir() {
        Arch::Win64
    } else {
        Arch::Win32
    }
}
