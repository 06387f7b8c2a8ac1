//! Collaborators the lifecycle code talks to but does not implement.
//!
//! Each trait has a default implementation suitable for an offline CLI:
//! no catalog, no connectivity, no dependency installer, no versioning.
//! Front-ends that have those capabilities inject their own through
//! [`ManagerBuilder`](crate::manager::ManagerBuilder).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::components::ComponentKind;
use crate::config::BottleConfig;
use crate::error::{BottlesError, Result};
use crate::settings::BottlesPaths;

/// Installable versions per component kind, with catalog metadata.
pub type CatalogIndex = BTreeMap<ComponentKind, BTreeMap<String, Value>>;

/// Remote catalog of downloadable component versions.
pub trait Catalog: Send + Sync {
    fn fetch(&self) -> Result<CatalogIndex>;

    /// Download and install one version locally.
    fn install(&self, kind: ComponentKind, version: &str) -> Result<()>;
}

pub trait Connectivity: Send + Sync {
    fn check(&self) -> bool;
}

/// The per-prefix background server of the compatibility engine.
pub trait RuntimeServer: Send + Sync {
    /// Ask the server to terminate.
    fn kill(&self, config: &BottleConfig) -> Result<()>;
    /// Block until the server has fully exited.
    fn wait(&self, config: &BottleConfig) -> Result<()>;
    fn is_alive(&self, config: &BottleConfig) -> bool;
    /// Terminate without letting the server shut down cleanly.
    fn force_kill(&self, config: &BottleConfig) -> Result<()>;
}

/// Resolves where a component version lives on disk.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, kind: ComponentKind, version: &str) -> PathBuf;
}

/// Installs winetricks-style dependency packages into a bottle.
pub trait DependencyInstaller: Send + Sync {
    fn install(&self, config: &BottleConfig, dependency: &str) -> Result<()>;
}

/// Snapshot backend for bottle states.
pub trait Versioning: Send + Sync {
    fn initialize(&self, config: &BottleConfig) -> Result<()>;
}

/// A third-party launcher that keeps its own record of managed bottles.
pub trait ManagedEnvironment: Send + Sync {
    fn reconcile(&self, config: &BottleConfig) -> Result<()>;
}

/// Catalog used when no network catalog is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCatalog;

impl Catalog for OfflineCatalog {
    fn fetch(&self) -> Result<CatalogIndex> {
        Ok(CatalogIndex::new())
    }

    fn install(&self, kind: ComponentKind, version: &str) -> Result<()> {
        Err(BottlesError::Collaborator(format!(
            "no component catalog configured, cannot install {kind} {version}"
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoConnectivity;

impl Connectivity for NoConnectivity {
    fn check(&self) -> bool {
        false
    }
}

/// Maps `(kind, version)` to `<data>/<kind dir>/<version>`.
#[derive(Debug, Clone)]
pub struct DataDirResolver {
    paths: BottlesPaths,
}

impl DataDirResolver {
    pub fn new(paths: BottlesPaths) -> Self {
        Self { paths }
    }
}

impl PathResolver for DataDirResolver {
    fn resolve(&self, kind: ComponentKind, version: &str) -> PathBuf {
        self.paths.component_dir(kind).join(version)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoDependencyInstaller;

impl DependencyInstaller for NoDependencyInstaller {
    fn install(&self, _config: &BottleConfig, dependency: &str) -> Result<()> {
        Err(BottlesError::Collaborator(format!(
            "no dependency installer configured, skipped {dependency}"
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoVersioning;

impl Versioning for NoVersioning {
    fn initialize(&self, config: &BottleConfig) -> Result<()> {
        Err(BottlesError::Collaborator(format!(
            "no versioning backend configured for {}",
            config.name
        )))
    }
}
