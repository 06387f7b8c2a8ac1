//! Creating a new bottle.
//!
//! Creation walks a fixed sequence of stages; each completed stage is
//! recorded in [`Created::stages`]. A failing stage aborts the creation and
//! leaves whatever was already written in place.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::components::{ComponentKind, InstallOptions, natural_cmp};
use crate::config::{Arch, BottleConfig, Environment, Update};
use crate::error::{BottlesError, IoResultExt, Result};
use crate::manager::environment::EnvironmentRecipe;
use crate::manager::{Manager, PLACEHOLDER_FILE, Placeholder, sandbox};
use crate::registry::wait_for_hives;
use crate::wine::BootAction;

/// Number of install-latest passes before giving up on missing essentials.
pub const PREFLIGHT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CreationStage {
    PathAllocated,
    DirectoryCreated,
    PlaceholderWritten,
    ConfigGenerated,
    TemplateApplied,
    EnvironmentApplied,
    PrefixInitialized,
    ComponentsInstalled,
    VersioningSeeded,
    Finalized,
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What to create.
#[derive(Debug, Clone)]
pub struct BottleRequest {
    pub name: String,
    pub environment: Environment,
    pub arch: Arch,
    /// Runner id; the newest installed runner when unset
    pub runner: Option<String>,
    pub dxvk: Option<String>,
    pub vkd3d: Option<String>,
    pub nvapi: Option<String>,
    pub latencyflex: Option<String>,
    /// Directory to create the bottle in instead of the bottles dir
    pub custom_path: Option<PathBuf>,
    /// YAML recipe overriding the environment's built-in one
    pub recipe: Option<PathBuf>,
    pub versioning: bool,
    pub sandbox: bool,
}

impl BottleRequest {
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            arch: Arch::Win64,
            runner: None,
            dxvk: None,
            vkd3d: None,
            nvapi: None,
            latencyflex: None,
            custom_path: None,
            recipe: None,
            versioning: false,
            sandbox: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub config: BottleConfig,
    pub stages: Vec<CreationStage>,
}

/// Directory name for a bottle: spaces become dashes, anything outside
/// `[A-Za-z0-9._-]` is dropped.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Identity a new bottle starts with.
pub fn default_windows(arch: Arch) -> &'static str {
    match arch {
        Arch::Win32 => "win7",
        Arch::Win64 => "win10",
    }
}

struct Allocation {
    name: String,
    /// Absolute bottle directory.
    dir: PathBuf,
    /// Value stored as `path` in the config.
    config_path: String,
}

impl Manager {
    /// Make sure every essential component kind has a version installed.
    ///
    /// Missing kinds are installed from the catalog (newest version) while
    /// connectivity is available, at most [`PREFLIGHT_ATTEMPTS`] times.
    pub fn preflight(&mut self) -> Result<()> {
        let mut attempts = 0;
        loop {
            let missing = self.components.missing_essentials();
            if missing.is_empty() {
                return Ok(());
            }
            if attempts >= PREFLIGHT_ATTEMPTS || !self.connectivity.check() {
                return Err(BottlesError::MissingEssentials {
                    missing: join_kinds(&missing),
                    attempts,
                });
            }
            attempts += 1;
            warn!(attempt = attempts, missing = %join_kinds(&missing), "Installing missing essential components");
            self.install_latest(&missing);
            self.refresh_components();
        }
    }

    fn install_latest(&self, kinds: &[ComponentKind]) {
        let index = match self.catalog.fetch() {
            Ok(index) => index,
            Err(err) => {
                warn!(error = %err, "Could not fetch component catalog");
                return;
            }
        };
        for kind in kinds {
            let latest = index
                .get(kind)
                .and_then(|versions| versions.keys().max_by(|a, b| natural_cmp(a, b)));
            let Some(version) = latest else {
                warn!(%kind, "Catalog offers no version");
                continue;
            };
            if let Err(err) = self.catalog.install(*kind, version) {
                warn!(%kind, %version, error = %err, "Component install failed");
            }
        }
    }

    fn allocate_path(&self, request: &BottleRequest) -> Result<Allocation> {
        let mut dir_name = sanitize_name(&request.name);
        if dir_name.is_empty() {
            return Err(BottlesError::InvalidValue {
                key: "name".to_string(),
                message: format!("'{}' has no usable characters", request.name),
            });
        }
        let mut name = request.name.clone();
        let base = request
            .custom_path
            .clone()
            .unwrap_or_else(|| self.ctx.paths.bottles.clone());
        let taken = |dir: &str| base.join(dir).exists() || self.ctx.paths.bottles.join(dir).exists();
        if taken(&dir_name) {
            let suffix: u32 = rand::thread_rng().gen_range(100..=200);
            warn!(path = %dir_name, suffix, "Bottle path already in use");
            dir_name = format!("{dir_name}__{suffix}");
            name = format!("{name}__{suffix}");
        }
        let dir = base.join(&dir_name);
        let config_path = if request.custom_path.is_some() {
            dir.to_string_lossy().into_owned()
        } else {
            dir_name
        };
        Ok(Allocation {
            name,
            dir,
            config_path,
        })
    }

    fn generate_config(&self, request: &BottleRequest, allocation: &Allocation) -> Result<BottleConfig> {
        let snapshot = self.components();
        let runner = match &request.runner {
            Some(runner) => runner.clone(),
            None => snapshot
                .latest(ComponentKind::Runner)
                .map(str::to_string)
                .ok_or_else(|| BottlesError::RunnerNotFound("no runner installed".to_string()))?,
        };
        self.require_runner(&runner)?;

        let pick = |requested: &Option<String>, kind: ComponentKind| {
            requested
                .clone()
                .or_else(|| snapshot.latest(kind).map(str::to_string))
        };
        let mut config = BottleConfig::new(
            allocation.name.clone(),
            allocation.config_path.clone(),
            request.arch,
            runner,
        );
        config.custom_path = request.custom_path.is_some();
        config.environment = request.environment;
        config.dxvk = pick(&request.dxvk, ComponentKind::Dxvk);
        config.vkd3d = pick(&request.vkd3d, ComponentKind::Vkd3d);
        config.nvapi = pick(&request.nvapi, ComponentKind::Nvapi);
        config.latencyflex = pick(&request.latencyflex, ComponentKind::Latencyflex);
        config.windows = default_windows(request.arch).to_string();
        config.versioning = request.versioning;
        config.parameters.sandbox = request.sandbox;
        Ok(config)
    }

    /// Create a bottle.
    pub fn create_bottle(&mut self, request: &BottleRequest) -> Result<Created> {
        self.preflight()?;
        let mut stages = Vec::new();

        let allocation = self.allocate_path(request)?;
        stages.push(CreationStage::PathAllocated);
        info!(name = %allocation.name, path = %allocation.dir.display(), "Creating bottle");

        if let Some(parent) = allocation.dir.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::create_dir(&allocation.dir).at(&allocation.dir)?;
        stages.push(CreationStage::DirectoryCreated);

        if request.custom_path.is_some() {
            self.write_placeholder(&allocation.dir)?;
            stages.push(CreationStage::PlaceholderWritten);
        }

        let mut config = self.generate_config(request, &allocation)?;
        self.store.save(&config)?;
        stages.push(CreationStage::ConfigGenerated);

        let recipe = EnvironmentRecipe::resolve(request.environment, request.recipe.as_deref())?
            .unwrap_or_default();
        for (key, value) in recipe.parameters {
            config = self
                .store
                .update(&config, Update::set(key, value).scope("parameters"))?;
        }
        // With a template only the dependencies it lacks are replayed.
        let template = self.templates.find(request.environment, request.arch)?;
        match &template {
            Some(entry) => {
                self.templates.unpack(entry, &allocation.dir)?;
                config.installed_dependencies = entry.installed_dependencies.clone();
                self.store.save(&config)?;
                stages.push(CreationStage::TemplateApplied);
            }
            None => stages.push(CreationStage::EnvironmentApplied),
        }

        let boot = if template.is_some() {
            BootAction::Update
        } else {
            BootAction::Init
        };
        self.wine.wineboot(&config, boot)?;
        wait_for_hives(&allocation.dir, self.ctx.hive_wait)?;
        if template.is_none() {
            self.registry.set_windows(&config, &config.windows)?;
            self.registry.apply_cmd_settings(&config)?;
        }
        if self.ctx.sandboxed {
            sandbox::unlink_user_folders(&allocation.dir, &whoami::username());
        }
        stages.push(CreationStage::PrefixInitialized);

        for kind in config.enabled_components() {
            if config.component_version(kind).is_none() {
                warn!(%kind, "Enabled component has no version, skipped");
                continue;
            }
            self.install_dll_component(&config, kind, false, None, &InstallOptions::default())?;
        }
        let (installed, complete) = self.install_dependencies(&config, &recipe.dependencies)?;
        config = installed;
        stages.push(CreationStage::ComponentsInstalled);

        if request.versioning {
            self.versioning.initialize(&config)?;
            stages.push(CreationStage::VersioningSeeded);
        }

        if template.is_none() && request.environment != Environment::Custom {
            if !complete {
                warn!(bottle = %config.name, "Dependencies missing, template not cached");
            } else if let Err(err) = self.templates.cache(&config, &allocation.dir) {
                warn!(error = %err, "Could not cache template");
            }
        }
        stages.push(CreationStage::Finalized);
        info!(bottle = %config.name, stages = stages.len(), "Bottle created");

        Ok(Created { config, stages })
    }

    fn write_placeholder(&self, dir: &Path) -> Result<()> {
        let Some(dir_name) = dir.file_name() else {
            return Err(BottlesError::InvalidValue {
                key: "custom_path".to_string(),
                message: format!("{} has no directory name", dir.display()),
            });
        };
        let placeholder_dir = self.ctx.paths.bottles.join(dir_name);
        fs::create_dir_all(&placeholder_dir).at(&placeholder_dir)?;
        let path = placeholder_dir.join(PLACEHOLDER_FILE);
        let content = serde_json::to_string_pretty(&Placeholder {
            path: dir.to_path_buf(),
        })?;
        fs::write(&path, content).at(&path)
    }

    /// Install recipe dependencies not yet recorded, recording the ones that
    /// succeeded. The flag is false when any of them failed.
    fn install_dependencies(
        &self,
        config: &BottleConfig,
        dependencies: &[String],
    ) -> Result<(BottleConfig, bool)> {
        let mut installed = config.installed_dependencies.clone();
        let mut complete = true;
        for dependency in dependencies {
            if installed.contains(dependency) {
                continue;
            }
            match self.dependencies.install(config, dependency) {
                Ok(()) => installed.push(dependency.clone()),
                Err(err) => {
                    warn!(%dependency, error = %err, "Dependency not installed");
                    complete = false;
                }
            }
        }
        if installed == config.installed_dependencies {
            return Ok((config.clone(), complete));
        }
        let config = self
            .store
            .update(config, Update::set("installed_dependencies", installed))?;
        Ok((config, complete))
    }
}

fn join_kinds(kinds: &[ComponentKind]) -> String {
    kinds
        .iter()
        .map(ComponentKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_name("My Games"), "My-Games");
        assert_eq!(sanitize_name("Office 2010 (x86)!"), "Office-2010-x86");
        assert_eq!(sanitize_name("a.b_c-d"), "a.b_c-d");
        assert_eq!(sanitize_name("日本"), "");
    }

    #[test]
    fn default_identity_per_arch() {
        assert_eq!(default_windows(Arch::Win32), "win7");
        assert_eq!(default_windows(Arch::Win64), "win10");
    }
}
