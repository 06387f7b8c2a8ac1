//! Cached archives of freshly created bottles.
//!
//! Templates live in `<data>/templates/<environment>-<arch>.tar.gz`, indexed
//! by `index.json`. Per-bottle state (the config, drive mappings, snapshots)
//! is left out of the archive.

use std::fs;
use std::path::{Path, PathBuf};

use bottles_common::archive::{pack_tar_gz, unpack_tar_gz};
use bottles_common::checksum::{sha256_file, verify_file};
use bottles_common::template::{TemplateEntry, TemplateIndex};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Arch, BottleConfig, CONFIG_FILE, Environment};
use crate::error::{IoResultExt, Result};
use crate::manager::PLACEHOLDER_FILE;

const EXCLUDE: &[&str] = &[CONFIG_FILE, PLACEHOLDER_FILE, "dosdevices", "states"];

#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    /// Index key of a template.
    pub fn key(environment: Environment, arch: Arch) -> String {
        format!("{environment}-{arch}")
    }

    pub fn list(&self) -> Result<Vec<TemplateEntry>> {
        Ok(TemplateIndex::load_from(&self.index_path())?.templates)
    }

    /// Template for an environment, if one is cached and its archive exists.
    pub fn find(&self, environment: Environment, arch: Arch) -> Result<Option<TemplateEntry>> {
        let index = TemplateIndex::load_from(&self.index_path())?;
        Ok(index
            .find(&Self::key(environment, arch))
            .filter(|entry| self.dir.join(&entry.file).is_file())
            .cloned())
    }

    /// Verify and unpack a template into `target`.
    pub fn unpack(&self, entry: &TemplateEntry, target: &Path) -> Result<()> {
        let archive = self.dir.join(&entry.file);
        verify_file(&archive, &entry.sha256)?;
        let files = unpack_tar_gz(&archive, target)?;
        info!(
            template = %entry.environment,
            files = files.len(),
            target = %target.display(),
            "Unpacked template"
        );
        Ok(())
    }

    /// Archive a bottle as the template for its environment.
    pub fn cache(&self, config: &BottleConfig, bottle_dir: &Path) -> Result<TemplateEntry> {
        fs::create_dir_all(&self.dir).at(&self.dir)?;
        let key = Self::key(config.environment, config.arch);
        let file = format!("{key}.tar.gz");
        let archive = self.dir.join(&file);
        pack_tar_gz(bottle_dir, &archive, EXCLUDE)?;

        let entry = TemplateEntry {
            environment: key,
            file,
            sha256: sha256_file(&archive)?,
            installed_dependencies: config.installed_dependencies.clone(),
            created_at: Utc::now(),
        };
        let mut index = TemplateIndex::load_from(&self.index_path())?;
        index.upsert(entry.clone());
        index.save_to(&self.index_path())?;
        info!(template = %entry.environment, "Cached template");
        Ok(entry)
    }

    pub fn remove(&self, environment: Environment, arch: Arch) -> Result<bool> {
        let mut index = TemplateIndex::load_from(&self.index_path())?;
        let key = Self::key(environment, arch);
        let Some(entry) = index.find(&key).cloned() else {
            return Ok(false);
        };
        let archive = self.dir.join(&entry.file);
        if let Err(err) = fs::remove_file(&archive) {
            warn!(archive = %archive.display(), error = %err, "Could not remove template archive");
        }
        index.remove(&key);
        index.save_to(&self.index_path())?;
        Ok(true)
    }
}
