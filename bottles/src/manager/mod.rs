//! Bottle lifecycle: creation, repair, runner changes and component toggles.
//!
//! The [`Manager`] owns the collaborators every operation needs and an
//! immutable [`ComponentSnapshot`] of locally installed versions. The
//! snapshot is replaced wholesale by [`Manager::refresh_components`]; readers
//! holding the previous `Arc` keep a consistent view.

pub mod create;
pub mod environment;
pub mod maintenance;
pub mod sandbox;
pub mod template;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::components::{
    CheckedComponent, ComponentKind, ComponentSnapshot, DllComponent, DllComponentKind,
    InstallOptions, InstallReport,
};
use crate::config::{BottleConfig, CONFIG_FILE, ConfigStore, Update};
use crate::context::Context;
use crate::error::{BottlesError, IoResultExt, Result};
use crate::external::{
    Catalog, Connectivity, DataDirResolver, DependencyInstaller, ManagedEnvironment,
    NoConnectivity, NoDependencyInstaller, NoVersioning, OfflineCatalog, PathResolver,
    RuntimeServer, Versioning,
};
use crate::registry::{BundleImporter, Reg, RegistryApplier, RegistryBundle};
use crate::wine::{Wine, WineServer};

pub use create::{BottleRequest, Created, CreationStage};
pub use environment::EnvironmentRecipe;
pub use template::TemplateStore;

/// Marker left in the bottles dir for a bottle stored elsewhere.
pub const PLACEHOLDER_FILE: &str = "placeholder.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Absolute path of the bottle directory.
    pub path: PathBuf,
}

pub struct Manager {
    ctx: Context,
    wine: Wine,
    store: ConfigStore,
    registry: RegistryApplier,
    importer: Arc<dyn BundleImporter>,
    server: Arc<dyn RuntimeServer>,
    catalog: Arc<dyn Catalog>,
    connectivity: Arc<dyn Connectivity>,
    resolver: Arc<dyn PathResolver>,
    dependencies: Arc<dyn DependencyInstaller>,
    versioning: Arc<dyn Versioning>,
    templates: TemplateStore,
    components: Arc<ComponentSnapshot>,
}

/// Builder for [`Manager`]; unset collaborators get offline defaults.
pub struct ManagerBuilder {
    ctx: Context,
    importer: Option<Arc<dyn BundleImporter>>,
    server: Option<Arc<dyn RuntimeServer>>,
    catalog: Option<Arc<dyn Catalog>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    resolver: Option<Arc<dyn PathResolver>>,
    dependencies: Option<Arc<dyn DependencyInstaller>>,
    versioning: Option<Arc<dyn Versioning>>,
    managed: Option<Arc<dyn ManagedEnvironment>>,
}

impl ManagerBuilder {
    pub fn importer(mut self, importer: Arc<dyn BundleImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn server(mut self, server: Arc<dyn RuntimeServer>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn dependencies(mut self, dependencies: Arc<dyn DependencyInstaller>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    pub fn versioning(mut self, versioning: Arc<dyn Versioning>) -> Self {
        self.versioning = Some(versioning);
        self
    }

    pub fn managed(mut self, managed: Arc<dyn ManagedEnvironment>) -> Self {
        self.managed = Some(managed);
        self
    }

    pub fn build(self) -> Manager {
        let ctx = self.ctx;
        let wine = Wine::new(ctx.clone());
        let server = self
            .server
            .unwrap_or_else(|| Arc::new(WineServer::new(wine.clone())));
        let importer = self
            .importer
            .unwrap_or_else(|| Arc::new(Reg::new(wine.clone())));
        let store = ConfigStore::new(ctx.paths.clone(), server.clone()).with_managed(self.managed);
        let components = Arc::new(ComponentSnapshot::scan(&ctx.paths, ctx.use_system_wine));
        Manager {
            registry: RegistryApplier::new(importer.clone(), wine.clone()),
            templates: TemplateStore::new(ctx.paths.templates.clone()),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(DataDirResolver::new(ctx.paths.clone()))),
            catalog: self.catalog.unwrap_or_else(|| Arc::new(OfflineCatalog)),
            connectivity: self.connectivity.unwrap_or_else(|| Arc::new(NoConnectivity)),
            dependencies: self
                .dependencies
                .unwrap_or_else(|| Arc::new(NoDependencyInstaller)),
            versioning: self.versioning.unwrap_or_else(|| Arc::new(NoVersioning)),
            ctx,
            wine,
            store,
            importer,
            server,
            components,
        }
    }
}

impl Manager {
    pub fn builder(ctx: Context) -> ManagerBuilder {
        ManagerBuilder {
            ctx,
            importer: None,
            server: None,
            catalog: None,
            connectivity: None,
            resolver: None,
            dependencies: None,
            versioning: None,
            managed: None,
        }
    }

    /// Manager with every collaborator at its default.
    pub fn new(ctx: Context) -> Self {
        Self::builder(ctx).build()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn registry(&self) -> &RegistryApplier {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Current component snapshot.
    pub fn components(&self) -> Arc<ComponentSnapshot> {
        Arc::clone(&self.components)
    }

    /// Rescan installed components and swap in the new snapshot.
    pub fn refresh_components(&mut self) -> Arc<ComponentSnapshot> {
        self.components = Arc::new(ComponentSnapshot::scan(
            &self.ctx.paths,
            self.ctx.use_system_wine,
        ));
        self.components()
    }

    pub fn prefix(&self, config: &BottleConfig) -> PathBuf {
        self.ctx.paths.bottle_path(config)
    }

    pub fn update_config(&self, config: &BottleConfig, update: Update) -> Result<BottleConfig> {
        self.store.update(config, update)
    }

    /// Import an arbitrary bundle into a bottle.
    pub fn import_bundle(&self, config: &BottleConfig, bundle: &RegistryBundle) -> Result<()> {
        self.importer.import(config, bundle)
    }

    /// Every bottle in the bottles dir, following placeholders.
    ///
    /// Directories without a readable config are skipped.
    pub fn list_bottles(&self) -> Result<Vec<BottleConfig>> {
        let dir = &self.ctx.paths.bottles;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .at(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        let mut bottles = Vec::new();
        for entry in entries {
            let config_path = match read_placeholder(&entry) {
                Some(placeholder) => BottleConfig::config_path(&placeholder.path),
                None => BottleConfig::config_path(&entry),
            };
            match BottleConfig::load(&config_path) {
                Ok(config) => bottles.push(config),
                Err(err) => {
                    warn!(path = %config_path.display(), error = %err, "Skipping unreadable bottle")
                }
            }
        }
        Ok(bottles)
    }

    /// Find a bottle by name or directory name.
    pub fn find_bottle(&self, name: &str) -> Result<BottleConfig> {
        self.list_bottles()?
            .into_iter()
            .find(|config| {
                config.name == name
                    || Path::new(&config.path).file_name().and_then(|n| n.to_str()) == Some(name)
            })
            .ok_or_else(|| BottlesError::BottleNotFound(name.to_string()))
    }

    /// Stop the bottle's server and remove its directory and placeholder.
    pub fn delete_bottle(&self, config: &BottleConfig) -> Result<()> {
        self.server.kill(config)?;
        let prefix = self.prefix(config);
        if prefix.exists() {
            fs::remove_dir_all(&prefix).at(&prefix)?;
        }
        if config.custom_path {
            if let Some(dir_name) = prefix.file_name() {
                let placeholder_dir = self.ctx.paths.bottles.join(dir_name);
                if placeholder_dir.join(PLACEHOLDER_FILE).exists() {
                    fs::remove_dir_all(&placeholder_dir).at(&placeholder_dir)?;
                }
            }
        }
        info!(bottle = %config.name, path = %prefix.display(), "Deleted bottle");
        Ok(())
    }

    /// Install or remove one DLL component in a bottle.
    ///
    /// `version` defaults to the one recorded on the bottle.
    pub fn install_dll_component(
        &self,
        config: &BottleConfig,
        kind: DllComponentKind,
        remove: bool,
        version: Option<&str>,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        let version = version
            .or_else(|| config.component_version(kind))
            .ok_or(BottlesError::ComponentNotSelected(kind.component_kind()))?;
        let component = self.checked_component(kind, version);
        let prefix = self.prefix(config);
        if remove {
            component.uninstall(config, &prefix, self.importer.as_ref(), &options.exclude)
        } else {
            component.install(config, &prefix, self.importer.as_ref(), options)
        }
    }

    fn checked_component(&self, kind: DllComponentKind, version: &str) -> CheckedComponent {
        let base = self.resolver.resolve(kind.component_kind(), version);
        debug!(%kind, %version, base = %base.display(), "Resolved component");
        DllComponent::new(kind, version, base).check()
    }

    /// Enable or disable a DLL component and sync its files and overrides.
    pub fn toggle_component(
        &self,
        config: &BottleConfig,
        kind: DllComponentKind,
        enabled: bool,
    ) -> Result<BottleConfig> {
        let mut config = config.clone();
        if enabled {
            if config.component_version(kind).is_none() {
                let latest = self
                    .components
                    .latest(kind.component_kind())
                    .ok_or(BottlesError::ComponentNotSelected(kind.component_kind()))?
                    .to_string();
                config = self.store.update(&config, Update::set(kind.as_str(), latest))?;
            }
            self.install_dll_component(&config, kind, false, None, &InstallOptions::default())?;
        } else if config.component_version(kind).is_some() {
            self.install_dll_component(&config, kind, true, None, &InstallOptions::default())?;
        }
        self.store
            .update(&config, Update::set(kind.parameter(), enabled).scope("parameters"))
    }

    /// Switch the Windows identity and record it.
    pub fn set_windows(&self, config: &BottleConfig, version: &str) -> Result<BottleConfig> {
        let bundle = self.registry.set_windows(config, version)?;
        debug!(entries = bundle.len(), "Windows identity applied");
        self.store
            .update(config, Update::set("windows", version.to_lowercase()))
    }

    pub fn set_dpi(&self, config: &BottleConfig, dpi: u32) -> Result<BottleConfig> {
        self.registry.set_dpi(config, dpi)?;
        self.store
            .update(config, Update::set("dpi", dpi).scope("parameters"))
    }

    pub fn set_renderer(&self, config: &BottleConfig, renderer: &str) -> Result<BottleConfig> {
        self.registry.set_renderer(config, renderer)?;
        self.store
            .update(config, Update::set("renderer", renderer).scope("parameters"))
    }

    fn require_runner(&self, runner: &str) -> Result<()> {
        if runner.starts_with("sys-") || self.components.contains(ComponentKind::Runner, runner) {
            Ok(())
        } else {
            Err(BottlesError::RunnerNotFound(runner.to_string()))
        }
    }
}

fn read_placeholder(dir: &Path) -> Option<Placeholder> {
    let path = dir.join(PLACEHOLDER_FILE);
    if !path.is_file() || dir.join(CONFIG_FILE).exists() {
        return None;
    }
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}
