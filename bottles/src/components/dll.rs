//! Installing a DLL component version into a prefix.
//!
//! A component starts [`Unchecked`] with the full descriptor of its kind.
//! [`DllComponent::check`] prunes the descriptor against the files on disk
//! and yields either a usable component or [`CheckedComponent::Empty`], for
//! which install and uninstall succeed without doing anything.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::components::DllComponentKind;
use crate::components::descriptor::{DllDescriptor, dll_base_name, system_dir};
use crate::components::slot::DllSlot;
use crate::config::BottleConfig;
use crate::error::Result;
use crate::registry::BundleImporter;
use crate::registry::keys::{self, NATIVE_BUILTIN};

/// Directive clearing an override.
const CLEAR: &str = "-";

#[derive(Debug, Clone, Copy)]
pub struct Unchecked;

#[derive(Debug, Clone, Copy)]
pub struct Checked;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Re-assert registry overrides without touching any file.
    pub overrides_only: bool,
    /// DLL file names or base names to leave alone.
    pub exclude: Vec<String>,
}

impl InstallOptions {
    fn excludes(&self, dll: &str) -> bool {
        self.exclude
            .iter()
            .any(|e| e == dll || e == dll_base_name(dll))
    }
}

/// What an install or uninstall did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub kind: DllComponentKind,
    pub version: String,
    /// Prefix files written or restored.
    pub touched: Vec<PathBuf>,
    /// DLL base names whose override was set or cleared.
    pub overrides: Vec<String>,
    /// DLLs skipped because their source file vanished.
    pub missing: Vec<String>,
}

impl InstallReport {
    fn new(kind: DllComponentKind, version: &str) -> Self {
        Self {
            kind,
            version: version.to_string(),
            touched: Vec::new(),
            overrides: Vec::new(),
            missing: Vec::new(),
        }
    }

    fn add_override(&mut self, dll: &str) {
        let name = dll_base_name(dll).to_string();
        if !self.overrides.contains(&name) {
            self.overrides.push(name);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DllComponent<S> {
    kind: DllComponentKind,
    version: String,
    base: PathBuf,
    descriptor: DllDescriptor,
    _state: PhantomData<S>,
}

impl<S> DllComponent<S> {
    pub fn kind(&self) -> DllComponentKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn descriptor(&self) -> &DllDescriptor {
        &self.descriptor
    }
}

impl DllComponent<Unchecked> {
    pub fn new(kind: DllComponentKind, version: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            version: version.into(),
            base: base.into(),
            descriptor: DllDescriptor::for_kind(kind),
            _state: PhantomData,
        }
    }

    /// Replace the kind's default descriptor.
    pub fn with_descriptor(mut self, descriptor: DllDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn check(self) -> CheckedComponent {
        let descriptor = self.descriptor.prune(&self.base);
        if descriptor.is_empty() {
            warn!(
                kind = %self.kind,
                version = %self.version,
                base = %self.base.display(),
                "Component has no DLLs on disk"
            );
            return CheckedComponent::Empty {
                kind: self.kind,
                version: self.version,
            };
        }
        CheckedComponent::Usable(DllComponent {
            kind: self.kind,
            version: self.version,
            base: self.base,
            descriptor,
            _state: PhantomData,
        })
    }
}

impl DllComponent<Checked> {
    /// Copy each DLL into the prefix and enable its override.
    pub fn install(
        &self,
        config: &BottleConfig,
        prefix: &Path,
        importer: &dyn BundleImporter,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        let mut report = InstallReport::new(self.kind, &self.version);
        for (bucket, dll) in self.descriptor.dlls() {
            if options.excludes(dll) {
                continue;
            }
            let source = self.base.join(bucket).join(dll);
            if !source.is_file() {
                warn!(source = %source.display(), "DLL missing, not overridden");
                report.missing.push(dll.to_string());
                continue;
            }
            if !options.overrides_only {
                if let Some(target) = target_path(config, prefix, bucket, dll) {
                    let slot = DllSlot::detect(&target);
                    let next = slot.override_with(&source, &target)?;
                    debug!(target = %target.display(), from = ?slot, to = ?next, "Installed DLL");
                    report.touched.push(target);
                } else {
                    debug!(%bucket, %dll, arch = %config.arch, "No system directory for bucket");
                }
            }
            report.add_override(dll);
        }

        if !report.overrides.is_empty() {
            let bundle = keys::dll_overrides(report.overrides.iter().map(String::as_str), NATIVE_BUILTIN);
            importer.import(config, &bundle)?;
        }
        info!(
            bottle = %config.name,
            kind = %self.kind,
            version = %self.version,
            copied = report.touched.len(),
            overrides = report.overrides.len(),
            "Installed component"
        );
        Ok(report)
    }

    /// Put back every backed-up DLL, remove live copies that had nothing to
    /// replace and clear the overrides. Whatever version wrote the files, the
    /// slots this kind names are released.
    pub fn uninstall(
        &self,
        config: &BottleConfig,
        prefix: &Path,
        importer: &dyn BundleImporter,
        exclude: &[String],
    ) -> Result<InstallReport> {
        let options = InstallOptions {
            overrides_only: false,
            exclude: exclude.to_vec(),
        };
        let mut report = InstallReport::new(self.kind, &self.version);
        for (bucket, dll) in self.descriptor.dlls() {
            if options.excludes(dll) {
                continue;
            }
            if let Some(target) = target_path(config, prefix, bucket, dll) {
                if DllSlot::release(&target)? {
                    report.touched.push(target);
                }
            }
            report.add_override(dll);
        }

        if !report.overrides.is_empty() {
            let bundle = keys::dll_overrides(report.overrides.iter().map(String::as_str), CLEAR);
            importer.import(config, &bundle)?;
        }
        info!(
            bottle = %config.name,
            kind = %self.kind,
            version = %self.version,
            restored = report.touched.len(),
            "Uninstalled component"
        );
        Ok(report)
    }
}

fn target_path(config: &BottleConfig, prefix: &Path, bucket: &str, dll: &str) -> Option<PathBuf> {
    let dir = system_dir(config.arch, bucket)?;
    Some(prefix.join("drive_c").join("windows").join(dir).join(dll))
}

/// Result of [`DllComponent::check`].
#[derive(Debug, Clone)]
pub enum CheckedComponent {
    Usable(DllComponent<Checked>),
    Empty { kind: DllComponentKind, version: String },
}

impl CheckedComponent {
    pub fn is_empty(&self) -> bool {
        matches!(self, CheckedComponent::Empty { .. })
    }

    pub fn install(
        &self,
        config: &BottleConfig,
        prefix: &Path,
        importer: &dyn BundleImporter,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        match self {
            CheckedComponent::Usable(component) => component.install(config, prefix, importer, options),
            CheckedComponent::Empty { kind, version } => Ok(InstallReport::new(*kind, version)),
        }
    }

    pub fn uninstall(
        &self,
        config: &BottleConfig,
        prefix: &Path,
        importer: &dyn BundleImporter,
        exclude: &[String],
    ) -> Result<InstallReport> {
        match self {
            CheckedComponent::Usable(component) => component.uninstall(config, prefix, importer, exclude),
            CheckedComponent::Empty { kind, version } => Ok(InstallReport::new(*kind, version)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Arch;
    use crate::registry::RegistryBundle;
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        bundles: Mutex<Vec<RegistryBundle>>,
    }

    impl BundleImporter for Recorder {
        fn import(&self, _: &BottleConfig, bundle: &RegistryBundle) -> Result<()> {
            self.bundles.lock().unwrap().push(bundle.clone());
            Ok(())
        }
    }

    struct Fixture {
        tmp: tempfile::TempDir,
        config: BottleConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            fs::create_dir_all(tmp.path().join("prefix/drive_c/windows/system32")).unwrap();
            fs::create_dir_all(tmp.path().join("prefix/drive_c/windows/syswow64")).unwrap();
            Self {
                tmp,
                config: BottleConfig::new("Games", "Games", Arch::Win64, "soda"),
            }
        }

        fn base(&self) -> PathBuf {
            self.tmp.path().join("dxvk-2.3")
        }

        fn prefix(&self) -> PathBuf {
            self.tmp.path().join("prefix")
        }

        fn source(&self, bucket: &str, dll: &str, content: &[u8]) {
            let dir = self.base().join(bucket);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(dll), content).unwrap();
        }

        fn system32(&self, dll: &str) -> PathBuf {
            self.prefix().join("drive_c/windows/system32").join(dll)
        }
    }

    #[test]
    fn check_prunes_and_install_copies_present_dlls_only() {
        let f = Fixture::new();
        f.source("x64", "d3d11.dll", b"dxvk d3d11");
        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base())
            .with_descriptor(DllDescriptor::new([("x64", vec!["d3d11.dll", "dxgi.dll"])]))
            .check();
        let CheckedComponent::Usable(checked) = &component else {
            panic!("expected usable component");
        };
        assert_eq!(
            checked.descriptor(),
            &DllDescriptor::new([("x64", vec!["d3d11.dll"])])
        );

        let recorder = Recorder::default();
        let report = component
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();

        assert_eq!(report.overrides, vec!["d3d11"]);
        assert_eq!(fs::read(f.system32("d3d11.dll")).unwrap(), b"dxvk d3d11");
        assert!(!f.system32("dxgi.dll").exists());
        let bundles = recorder.bundles.lock().unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].len(), 1);
        assert_eq!(
            bundles[0].get(keys::DLL_OVERRIDES, "d3d11").unwrap().data,
            NATIVE_BUILTIN
        );
    }

    #[test]
    fn install_then_uninstall_restores_originals() {
        let f = Fixture::new();
        f.source("x64", "d3d11.dll", b"dxvk64");
        f.source("x32", "d3d11.dll", b"dxvk32");
        fs::write(f.system32("d3d11.dll"), b"builtin").unwrap();

        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base()).check();
        let recorder = Recorder::default();
        component
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();
        let wow = f.prefix().join("drive_c/windows/syswow64/d3d11.dll");
        assert_eq!(fs::read(&wow).unwrap(), b"dxvk32");

        let report = component
            .uninstall(&f.config, &f.prefix(), &recorder, &[])
            .unwrap();
        assert_eq!(report.touched.len(), 2);
        assert_eq!(fs::read(f.system32("d3d11.dll")).unwrap(), b"builtin");
        assert!(!wow.exists());

        let bundles = recorder.bundles.lock().unwrap();
        assert_eq!(bundles[1].get(keys::DLL_OVERRIDES, "d3d11").unwrap().data, "-");
    }

    #[test]
    fn original_matching_the_component_survives_round_trip() {
        let f = Fixture::new();
        f.source("x64", "d3d11.dll", b"same");
        fs::write(f.system32("d3d11.dll"), b"same").unwrap();
        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base())
            .with_descriptor(DllDescriptor::new([("x64", vec!["d3d11.dll"])]))
            .check();
        let recorder = Recorder::default();

        component
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();
        assert!(DllSlot::backup_path(&f.system32("d3d11.dll")).is_file());
        component
            .uninstall(&f.config, &f.prefix(), &recorder, &[])
            .unwrap();

        assert_eq!(fs::read(f.system32("d3d11.dll")).unwrap(), b"same");
        assert!(!DllSlot::backup_path(&f.system32("d3d11.dll")).exists());
    }

    #[test]
    fn uninstall_removes_copies_left_by_another_version() {
        let f = Fixture::new();
        let newer = f.tmp.path().join("dxvk-2.4");
        fs::create_dir_all(newer.join("x64")).unwrap();
        fs::write(newer.join("x64/dxgi.dll"), b"dxvk 2.4").unwrap();
        f.source("x64", "dxgi.dll", b"dxvk 2.3");
        let descriptor = DllDescriptor::new([("x64", vec!["dxgi.dll"])]);
        let recorder = Recorder::default();

        DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.4", newer)
            .with_descriptor(descriptor.clone())
            .check()
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();
        assert_eq!(fs::read(f.system32("dxgi.dll")).unwrap(), b"dxvk 2.4");

        let report = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base())
            .with_descriptor(descriptor)
            .check()
            .uninstall(&f.config, &f.prefix(), &recorder, &[])
            .unwrap();

        assert_eq!(report.touched, vec![f.system32("dxgi.dll")]);
        assert!(!f.system32("dxgi.dll").exists());
    }

    #[test]
    fn overrides_only_touches_no_files() {
        let f = Fixture::new();
        f.source("x64", "dxgi.dll", b"dxvk");
        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base()).check();
        let recorder = Recorder::default();
        let options = InstallOptions {
            overrides_only: true,
            exclude: Vec::new(),
        };
        let report = component
            .install(&f.config, &f.prefix(), &recorder, &options)
            .unwrap();

        assert!(report.touched.is_empty());
        assert!(!f.system32("dxgi.dll").exists());
        assert_eq!(report.overrides, vec!["dxgi"]);
    }

    #[test]
    fn exclusions_match_file_or_base_name() {
        let f = Fixture::new();
        f.source("x64", "d3d11.dll", b"a");
        f.source("x64", "dxgi.dll", b"b");
        f.source("x64", "d3d9.dll", b"c");
        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base()).check();
        let recorder = Recorder::default();
        let options = InstallOptions {
            overrides_only: false,
            exclude: vec!["dxgi".into(), "d3d9.dll".into()],
        };
        let report = component
            .install(&f.config, &f.prefix(), &recorder, &options)
            .unwrap();
        assert_eq!(report.overrides, vec!["d3d11"]);
    }

    #[test]
    fn empty_component_is_a_noop() {
        let f = Fixture::new();
        let component = DllComponent::new(DllComponentKind::Vkd3d, "vkd3d-2.11", f.base()).check();
        assert!(component.is_empty());

        let recorder = Recorder::default();
        let report = component
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();
        assert!(report.overrides.is_empty());
        assert!(recorder.bundles.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_bucket_is_registered_but_not_copied() {
        let f = Fixture::new();
        f.source("arm64", "d3d11.dll", b"arm");
        let component = DllComponent::new(DllComponentKind::Dxvk, "dxvk-2.3", f.base())
            .with_descriptor(DllDescriptor::new([("arm64", vec!["d3d11.dll"])]))
            .check();
        let recorder = Recorder::default();
        let report = component
            .install(&f.config, &f.prefix(), &recorder, &InstallOptions::default())
            .unwrap();
        assert!(report.touched.is_empty());
        assert_eq!(report.overrides, vec!["d3d11"]);
    }
}
