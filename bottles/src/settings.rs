//! User settings and the on-disk layout of the data directory.
//!
//! Settings live at `~/.config/bottles/settings.json`. Every field has a
//! default, so a missing file is the same as an empty one. A few values can
//! be overridden from the environment:
//!
//! - `BOTTLES_DATA_DIR`: root of bottles, runners, components and templates
//! - `BOTTLES_HIVE_TIMEOUT`: seconds to wait for registry hives to appear

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::BaseDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::components::ComponentKind;
use crate::config::BottleConfig;
use crate::registry::HiveWait;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    /// Root data directory (defaults to ~/.local/share/bottles)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Seconds to wait for the runtime to materialize registry hives
    #[serde(default = "default_hive_timeout")]
    pub hive_timeout_secs: u64,

    /// Poll interval while waiting for registry hives
    #[serde(default = "default_hive_poll")]
    pub hive_poll_interval_ms: u64,

    /// Offer the system-wide wine installation as a runner
    #[serde(default = "default_true")]
    pub use_system_wine: bool,

    /// Treat the process as sandboxed even without FLATPAK_ID
    #[serde(default)]
    pub sandboxed: bool,
}

fn default_hive_timeout() -> u64 {
    120
}

fn default_hive_poll() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            hive_timeout_secs: default_hive_timeout(),
            hive_poll_interval_ms: default_hive_poll(),
            use_system_wine: true,
            sandboxed: false,
        }
    }
}

impl Settings {
    /// Get the settings file path.
    ///
    /// Respects `$HOME` environment variable for test isolation.
    pub fn path() -> PathBuf {
        let config_dir = std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
            .or_else(|| BaseDirs::new().map(|d| d.config_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".config"));
        config_dir.join("bottles").join("settings.json")
    }

    /// Load settings from a path, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
        Ok(settings)
    }

    /// Load the user settings and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::path())?;
        settings.apply_env()?;
        Ok(settings)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("BOTTLES_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(secs) = std::env::var("BOTTLES_HIVE_TIMEOUT") {
            self.hive_timeout_secs = secs
                .parse()
                .with_context(|| format!("BOTTLES_HIVE_TIMEOUT is not a number: {secs}"))?;
        }
        Ok(())
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".local/share"))
            .or_else(|| BaseDirs::new().map(|d| d.data_local_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("bottles")
    }

    pub fn paths(&self) -> BottlesPaths {
        BottlesPaths::new(self.data_dir())
    }

    pub fn hive_wait(&self) -> HiveWait {
        HiveWait {
            interval: Duration::from_millis(self.hive_poll_interval_ms),
            timeout: Duration::from_secs(self.hive_timeout_secs),
        }
    }
}

/// Directory layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottlesPaths {
    pub data: PathBuf,
    pub bottles: PathBuf,
    pub templates: PathBuf,
    pub temp: PathBuf,
}

impl BottlesPaths {
    pub fn new(data: PathBuf) -> Self {
        Self {
            bottles: data.join("bottles"),
            templates: data.join("templates"),
            temp: data.join("temp"),
            data,
        }
    }

    /// Directory holding every installed version of a component kind.
    pub fn component_dir(&self, kind: ComponentKind) -> PathBuf {
        self.data.join(kind.dir_name())
    }

    /// Create every directory in the layout.
    pub fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.bottles)?;
        fs::create_dir_all(&self.templates)?;
        fs::create_dir_all(&self.temp)?;
        for kind in ComponentKind::ALL {
            fs::create_dir_all(self.component_dir(kind))?;
        }
        Ok(())
    }

    /// Prefix directory of a bottle.
    ///
    /// Bottles created under a custom location store an absolute path;
    /// everything else is relative to the bottles directory.
    pub fn bottle_path(&self, config: &BottleConfig) -> PathBuf {
        if config.custom_path {
            PathBuf::from(&config.path)
        } else {
            self.bottles.join(&config.path)
        }
    }
}
