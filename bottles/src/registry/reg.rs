//! Registry edits through the runner's `regedit` and `reg` tools.

use std::io::Write;

use tracing::{debug, info};

use crate::config::BottleConfig;
use crate::error::{IoResultExt, Result};
use crate::registry::bundle::{RegHeader, RegType, RegistryBundle};
use crate::registry::hive::{self, HIVES, HiveDiff, HiveSnapshot};
use crate::registry::BundleImporter;
use crate::wine::Wine;

#[derive(Debug, Clone)]
pub struct Reg {
    wine: Wine,
}

impl Reg {
    pub fn new(wine: Wine) -> Self {
        Self { wine }
    }

    /// Set one value with `reg add`.
    pub fn add(
        &self,
        config: &BottleConfig,
        key: &str,
        value: &str,
        data: &str,
        kind: Option<RegType>,
    ) -> Result<()> {
        self.wait_for_hives(config)?;
        let flag = kind.map(|k| k.reg_flag()).unwrap_or("REG_SZ");
        info!(bottle = %config.name, %key, %value, "reg add");
        self.wine.run(
            config,
            &["reg", "add", key, "/v", value, "/d", data, "/t", flag, "/f"],
        )
    }

    /// Delete one value with `reg delete`.
    pub fn remove(&self, config: &BottleConfig, key: &str, value: &str) -> Result<()> {
        self.wait_for_hives(config)?;
        info!(bottle = %config.name, %key, %value, "reg delete");
        self.wine.run(config, &["reg", "delete", key, "/v", value, "/f"])
    }

    /// Back up both hives, import `bundle` and report what changed.
    pub fn patch_with_backup(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<HiveDiff> {
        self.wait_for_hives(config)?;
        let prefix = self.wine.prefix(config);
        let mut before = HiveSnapshot::default();
        for name in HIVES {
            let path = prefix.join(name);
            HiveSnapshot::backup(&path)?;
            before.apply_reg_text(&std::fs::read_to_string(&path).at(&path)?);
        }
        self.import(config, bundle)?;
        let mut after = HiveSnapshot::default();
        for name in HIVES {
            let path = prefix.join(name);
            after.apply_reg_text(&std::fs::read_to_string(&path).at(&path)?);
        }
        Ok(before.diff(&after))
    }

    fn wait_for_hives(&self, config: &BottleConfig) -> Result<()> {
        hive::wait_for_hives(&self.wine.prefix(config), self.wine.context().hive_wait)
    }
}

impl BundleImporter for Reg {
    /// Write the bundle to a temporary `.reg` file and feed it to `regedit /S`.
    ///
    /// The temp file is removed when this returns, whether or not the import
    /// succeeded.
    fn import(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<()> {
        if bundle.is_empty() {
            debug!(bottle = %config.name, "Empty registry bundle, nothing to import");
            return Ok(());
        }
        self.wait_for_hives(config)?;

        let temp_dir = &self.wine.context().paths.temp;
        std::fs::create_dir_all(temp_dir).at(temp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("bundle-")
            .suffix(".reg")
            .tempfile_in(temp_dir)
            .at(temp_dir)?;
        file.write_all(bundle.render(RegHeader::Version5).as_bytes())
            .at(file.path())?;
        file.flush().at(file.path())?;

        let path = file.path().to_string_lossy().into_owned();
        info!(bottle = %config.name, entries = bundle.len(), "Importing registry bundle");
        self.wine.run(config, &["regedit", "/S", &path])
    }
}
