//! Bottle configuration document.
//!
//! Each bottle persists its identity as `bottle.json` at the root of its
//! prefix. The document is always rewritten whole, pretty-printed with a
//! four-space indent. Keys this crate does not know about, at the top level
//! or inside `parameters`, are kept verbatim across rewrites.

pub mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::DllComponentKind;
use crate::error::{BottlesError, IoResultExt, Result};

pub use store::{ConfigStore, Update};

/// File name of the configuration document inside a bottle.
pub const CONFIG_FILE: &str = "bottle.json";

/// Target architecture of a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Win32,
    #[default]
    Win64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Win32 => "win32",
            Arch::Win64 => "win64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = BottlesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "win32" | "32" => Ok(Arch::Win32),
            "win64" | "64" => Ok(Arch::Win64),
            other => Err(BottlesError::InvalidValue {
                key: "arch".to_string(),
                message: format!("expected win32 or win64, got '{other}'"),
            }),
        }
    }
}

/// What a bottle was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Gaming,
    Application,
    #[default]
    Custom,
    /// Managed by a third-party launcher that keeps its own record.
    Steam,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Gaming => "gaming",
            Environment::Application => "application",
            Environment::Custom => "custom",
            Environment::Steam => "steam",
        }
    }

    /// Environments whose bottles are also tracked by an external collaborator.
    pub fn is_managed(&self) -> bool {
        matches!(self, Environment::Steam)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = BottlesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaming" => Ok(Environment::Gaming),
            "application" => Ok(Environment::Application),
            "custom" => Ok(Environment::Custom),
            "steam" => Ok(Environment::Steam),
            other => Err(BottlesError::InvalidValue {
                key: "environment".to_string(),
                message: format!("unknown environment '{other}'"),
            }),
        }
    }
}

/// Memory-synchronization primitive used by the compatibility engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Wine,
    Esync,
    Fsync,
    Ntsync,
}

/// Feature flags stored under the `parameters` scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameters {
    #[serde(default)]
    pub dxvk: bool,
    #[serde(default)]
    pub vkd3d: bool,
    #[serde(default)]
    pub dxvk_nvapi: bool,
    #[serde(default)]
    pub latencyflex: bool,
    #[serde(default)]
    pub sync: SyncMode,
    /// Run programs of this bottle in an isolated sandbox
    #[serde(default)]
    pub sandbox: bool,
    /// Capture the mouse in fullscreen windows
    #[serde(default)]
    pub fullscreen_capture: bool,
    /// Direct3D renderer (gl, vulkan, gdi, no3d)
    #[serde(default = "default_renderer")]
    pub renderer: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_renderer() -> String {
    "gl".to_string()
}

fn default_dpi() -> u32 {
    96
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dxvk: false,
            vkd3d: false,
            dxvk_nvapi: false,
            latencyflex: false,
            sync: SyncMode::default(),
            sandbox: false,
            fullscreen_capture: false,
            renderer: default_renderer(),
            dpi: default_dpi(),
            extra: BTreeMap::new(),
        }
    }
}

impl Parameters {
    /// Whether the parameter that enables a DLL component is set.
    pub fn component_enabled(&self, kind: DllComponentKind) -> bool {
        match kind {
            DllComponentKind::Dxvk => self.dxvk,
            DllComponentKind::Vkd3d => self.vkd3d,
            DllComponentKind::Nvapi => self.dxvk_nvapi,
            DllComponentKind::LatencyFlex => self.latencyflex,
        }
    }
}

/// A program registered in the bottle for quick launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalProgram {
    pub name: String,
    pub executable: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// The bottle.json document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BottleConfig {
    pub name: String,
    /// Directory name under the bottles dir, or an absolute path when `custom_path` is set
    pub path: String,
    #[serde(default)]
    pub custom_path: bool,
    #[serde(default)]
    pub arch: Arch,
    pub runner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dxvk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vkd3d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nvapi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latencyflex: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    /// Windows identity reported to programs
    #[serde(default = "default_windows")]
    pub windows: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub installed_dependencies: Vec<String>,
    #[serde(default)]
    pub dll_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub external_programs: BTreeMap<String, ExternalProgram>,
    #[serde(default)]
    pub versioning: bool,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_windows() -> String {
    "win10".to_string()
}

impl Default for BottleConfig {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            name: String::new(),
            path: String::new(),
            custom_path: false,
            arch: Arch::default(),
            runner: String::new(),
            dxvk: None,
            vkd3d: None,
            nvapi: None,
            latencyflex: None,
            environment: Environment::default(),
            windows: default_windows(),
            parameters: Parameters::default(),
            installed_dependencies: Vec::new(),
            dll_overrides: BTreeMap::new(),
            external_programs: BTreeMap::new(),
            versioning: false,
            creation_date: now,
            update_date: now,
            extra: BTreeMap::new(),
        }
    }
}

impl BottleConfig {
    /// Minimal configuration for a new bottle.
    pub fn new(name: impl Into<String>, path: impl Into<String>, arch: Arch, runner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            arch,
            runner: runner.into(),
            ..Default::default()
        }
    }

    /// Version recorded for a DLL component, if any.
    pub fn component_version(&self, kind: DllComponentKind) -> Option<&str> {
        match kind {
            DllComponentKind::Dxvk => self.dxvk.as_deref(),
            DllComponentKind::Vkd3d => self.vkd3d.as_deref(),
            DllComponentKind::Nvapi => self.nvapi.as_deref(),
            DllComponentKind::LatencyFlex => self.latencyflex.as_deref(),
        }
    }

    pub fn set_component_version(&mut self, kind: DllComponentKind, version: Option<String>) {
        let slot = match kind {
            DllComponentKind::Dxvk => &mut self.dxvk,
            DllComponentKind::Vkd3d => &mut self.vkd3d,
            DllComponentKind::Nvapi => &mut self.nvapi,
            DllComponentKind::LatencyFlex => &mut self.latencyflex,
        };
        *slot = version;
    }

    /// DLL components enabled by this bottle's parameters.
    pub fn enabled_components(&self) -> Vec<DllComponentKind> {
        DllComponentKind::ALL
            .into_iter()
            .filter(|kind| self.parameters.component_enabled(*kind))
            .collect()
    }

    /// Path of the configuration document inside a prefix.
    pub fn config_path(bottle_dir: &Path) -> PathBuf {
        bottle_dir.join(CONFIG_FILE)
    }

    /// Load a configuration document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).at(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Render the document with a four-space indent.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|err| BottlesError::InvalidValue {
            key: "config".to_string(),
            message: err.to_string(),
        })
    }

    /// Write the whole document, replacing the previous file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_pretty_json()?;
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).at(parent)?;
        let temp_path = parent.join(format!(".{CONFIG_FILE}.tmp.{}", std::process::id()));
        fs::write(&temp_path, content).at(&temp_path)?;
        fs::rename(&temp_path, path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            BottlesError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(())
    }
}
