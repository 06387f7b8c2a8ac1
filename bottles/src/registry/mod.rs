//! Registry deltas for a bottle's private hives.
//!
//! Changes are collected into a [`RegistryBundle`] and imported in one pass
//! by a [`BundleImporter`]. [`Reg`] is the importer backed by the runner's
//! `regedit`; tests and front-ends may substitute their own.

pub mod bundle;
pub mod hive;
pub mod keys;
pub mod reg;
pub mod windows;

use std::sync::Arc;

use tracing::info;

use crate::config::BottleConfig;
use crate::error::Result;
use crate::wine::{BootAction, Wine};

pub use bundle::{RegEntry, RegHeader, RegType, RegistryBundle};
pub use hive::{HiveDiff, HiveSnapshot, HiveWait, wait_for_hives};
pub use reg::Reg;
pub use windows::WindowsIdentity;

/// Imports a whole bundle into a bottle's registry in one pass.
pub trait BundleImporter: Send + Sync {
    fn import(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<()>;
}

/// Higher-level registry operations built from fixed bundles.
#[derive(Clone)]
pub struct RegistryApplier {
    importer: Arc<dyn BundleImporter>,
    wine: Wine,
}

impl RegistryApplier {
    pub fn new(importer: Arc<dyn BundleImporter>, wine: Wine) -> Self {
        Self { importer, wine }
    }

    pub fn import(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<()> {
        self.importer.import(config, bundle)
    }

    /// Switch the Windows identity reported inside the bottle.
    ///
    /// Returns the bundle describing the new identity.
    pub fn set_windows(&self, config: &BottleConfig, version: &str) -> Result<RegistryBundle> {
        let identity = windows::identity_bundle(version, config.arch)?;
        info!(bottle = %config.name, %version, "Setting Windows version");
        self.importer.import(config, &windows::delete_bundle())?;
        self.importer.import(config, &identity)?;
        self.wine.wineboot(config, BootAction::Restart)?;
        self.wine.wineboot(config, BootAction::Update)?;
        Ok(identity)
    }

    /// Default console font and buffer sizes for `cmd.exe`.
    pub fn apply_cmd_settings(&self, config: &BottleConfig) -> Result<()> {
        self.importer.import(config, &keys::cmd_settings())
    }

    pub fn set_dpi(&self, config: &BottleConfig, dpi: u32) -> Result<()> {
        self.importer.import(config, &keys::dpi(dpi)?)
    }

    pub fn set_renderer(&self, config: &BottleConfig, renderer: &str) -> Result<()> {
        self.importer.import(config, &keys::renderer(renderer)?)
    }
}
