//! Shared fixtures for lifecycle tests.
//!
//! A [`Harness`] owns a temporary data directory with one installed version
//! of every essential component, a [`MockCommandRunner`] that fakes what
//! `wineboot` leaves behind, and an in-memory registry.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bottles::command_runner::{MockCommandRunner, RecordedCall};
use bottles::components::ComponentKind;
use bottles::config::BottleConfig;
use bottles::context::Context;
use bottles::error::{BottlesError, Result};
use bottles::external::{Catalog, CatalogIndex, Connectivity, DependencyInstaller, Versioning};
use bottles::manager::{Manager, ManagerBuilder};
use bottles::registry::{BundleImporter, HiveSnapshot, HiveWait, RegistryBundle};
use bottles::settings::Settings;

pub const RUNNER: &str = "soda-9.0-1";
pub const DXVK: &str = "dxvk-2.3";
pub const VKD3D: &str = "vkd3d-proton-2.11";
pub const NVAPI: &str = "dxvk-nvapi-0.7";

/// Content the fake `wineboot` writes for the runner's own DLLs.
pub const BUILTIN: &[u8] = b"wine builtin";

/// Registry backed by one snapshot per bottle name.
#[derive(Default)]
pub struct MemoryRegistry {
    hives: Mutex<BTreeMap<String, HiveSnapshot>>,
    imports: Mutex<Vec<(String, RegistryBundle)>>,
}

impl MemoryRegistry {
    pub fn get(&self, bottle: &str, key: &str, value: &str) -> Option<String> {
        self.hives
            .lock()
            .unwrap()
            .get(bottle)
            .and_then(|hive| hive.get(key, value))
            .map(str::to_string)
    }

    /// Drop everything recorded for `bottle`, as if its hives were reset.
    pub fn forget(&self, bottle: &str) {
        self.hives.lock().unwrap().remove(bottle);
    }

    pub fn import_count(&self) -> usize {
        self.imports.lock().unwrap().len()
    }
}

impl BundleImporter for MemoryRegistry {
    fn import(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<()> {
        self.hives
            .lock()
            .unwrap()
            .entry(config.name.clone())
            .or_default()
            .apply_bundle(bundle);
        self.imports
            .lock()
            .unwrap()
            .push((config.name.clone(), bundle.clone()));
        Ok(())
    }
}

/// Records dependency installs; names listed in `failing` error out.
#[derive(Default)]
pub struct RecordingDependencies {
    pub installed: Mutex<Vec<String>>,
    pub failing: Vec<String>,
}

impl DependencyInstaller for RecordingDependencies {
    fn install(&self, _config: &BottleConfig, dependency: &str) -> Result<()> {
        if self.failing.iter().any(|f| f == dependency) {
            return Err(BottlesError::Collaborator(format!("{dependency} failed")));
        }
        self.installed.lock().unwrap().push(dependency.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingVersioning {
    pub seeded: Mutex<Vec<String>>,
}

impl Versioning for RecordingVersioning {
    fn initialize(&self, config: &BottleConfig) -> Result<()> {
        self.seeded.lock().unwrap().push(config.name.clone());
        Ok(())
    }
}

pub struct Online;

impl Connectivity for Online {
    fn check(&self) -> bool {
        true
    }
}

/// Catalog that installs by creating the component directory, optionally
/// doing nothing to simulate a broken download.
pub struct DirCatalog {
    pub data: PathBuf,
    pub broken: bool,
    pub installs: Mutex<Vec<(ComponentKind, String)>>,
}

impl Catalog for DirCatalog {
    fn fetch(&self) -> Result<CatalogIndex> {
        let mut index = CatalogIndex::new();
        for (kind, versions) in [
            (ComponentKind::Runner, ["soda-8.0-2", RUNNER]),
            (ComponentKind::Dxvk, ["dxvk-2.2", DXVK]),
            (ComponentKind::Vkd3d, ["vkd3d-proton-2.10", VKD3D]),
            (ComponentKind::Nvapi, ["dxvk-nvapi-0.6", NVAPI]),
        ] {
            index.insert(
                kind,
                versions
                    .iter()
                    .map(|v| (v.to_string(), serde_json::Value::Null))
                    .collect(),
            );
        }
        Ok(index)
    }

    fn install(&self, kind: ComponentKind, version: &str) -> Result<()> {
        self.installs
            .lock()
            .unwrap()
            .push((kind, version.to_string()));
        if !self.broken {
            install_component(&self.data, kind, version);
        }
        Ok(())
    }
}

pub struct Harness {
    pub tmp: tempfile::TempDir,
    pub mock: Arc<MockCommandRunner>,
    pub registry: Arc<MemoryRegistry>,
    pub ctx: Context,
}

impl Harness {
    /// Data directory with every essential component installed.
    pub fn new() -> Self {
        let harness = Self::empty();
        install_component(&harness.data(), ComponentKind::Runner, RUNNER);
        install_component(&harness.data(), ComponentKind::Dxvk, DXVK);
        install_component(&harness.data(), ComponentKind::Vkd3d, VKD3D);
        install_component(&harness.data(), ComponentKind::Nvapi, NVAPI);
        harness
    }

    /// Data directory with nothing installed.
    pub fn empty() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: Some(tmp.path().join("data")),
            use_system_wine: false,
            sandboxed: false,
            ..Default::default()
        };
        let mock = Arc::new(MockCommandRunner::new());
        mock.on_call(fake_wineboot);
        let mut ctx = Context::new(&settings, mock.clone());
        ctx.hive_wait = HiveWait {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(200),
        };
        ctx.paths.ensure().unwrap();
        Self {
            tmp,
            mock,
            registry: Arc::new(MemoryRegistry::default()),
            ctx,
        }
    }

    pub fn data(&self) -> PathBuf {
        self.ctx.paths.data.clone()
    }

    pub fn builder(&self) -> ManagerBuilder {
        Manager::builder(self.ctx.clone()).importer(self.registry.clone())
    }

    pub fn manager(&self) -> Manager {
        self.builder().build()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.mock.command_lines()
    }
}

/// Lay out a component version the way a release archive unpacks.
pub fn install_component(data: &Path, kind: ComponentKind, version: &str) {
    let base = data.join(kind.dir_name()).join(version);
    let files: &[(&str, &[&str])] = match kind {
        ComponentKind::Runner => &[("bin", &["wine", "wineserver"])],
        ComponentKind::Dxvk => &[
            ("x32", &["d3d9.dll", "d3d11.dll", "dxgi.dll"]),
            ("x64", &["d3d9.dll", "d3d11.dll", "dxgi.dll"]),
        ],
        ComponentKind::Vkd3d => &[
            ("x86", &["d3d12.dll", "d3d12core.dll"]),
            ("x64", &["d3d12.dll", "d3d12core.dll"]),
        ],
        ComponentKind::Nvapi => &[("x32", &["nvapi.dll"]), ("x64", &["nvapi64.dll"])],
        _ => &[],
    };
    fs::create_dir_all(&base).unwrap();
    for (bucket, names) in files {
        let dir = base.join(bucket);
        fs::create_dir_all(&dir).unwrap();
        for name in *names {
            fs::write(dir.join(name), format!("{version}/{bucket}/{name}")).unwrap();
        }
    }
}

/// What `wineboot` leaves in a prefix: the system directories, the runner's
/// own `d3d11.dll` and both hives.
fn fake_wineboot(call: &RecordedCall) {
    if !call.invokes("wineboot") {
        return;
    }
    let Some(prefix) = call.env_var("WINEPREFIX") else {
        return;
    };
    let prefix = Path::new(prefix);
    let windows = prefix.join("drive_c/windows");
    let system32 = windows.join("system32");
    fs::create_dir_all(&system32).unwrap();
    if call.env_var("WINEARCH") == Some("win64") {
        fs::create_dir_all(windows.join("syswow64")).unwrap();
    }
    if !system32.join("d3d11.dll").exists() {
        fs::write(system32.join("d3d11.dll"), BUILTIN).unwrap();
    }
    for hive in ["user.reg", "system.reg"] {
        if !prefix.join(hive).exists() {
            fs::write(prefix.join(hive), "WINE REGISTRY Version 2\n").unwrap();
        }
    }
}
