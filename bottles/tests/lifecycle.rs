//! End-to-end lifecycle tests against a mocked runtime.

mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use bottles::command_runner::RecordedCall;
use bottles::components::{ComponentKind, DllComponentKind, InstallOptions};
use bottles::config::{Arch, BottleConfig, Environment, SyncMode};
use bottles::error::BottlesError;
use bottles::manager::{BottleRequest, CreationStage, PLACEHOLDER_FILE};
use bottles::registry::keys::DLL_OVERRIDES;
use bottles::registry::windows::NT_CURRENT_VERSION;

use common::*;

const NATIVE: &str = "\"native,builtin\"";

fn d3d11(manager_prefix: &std::path::Path) -> Vec<u8> {
    fs::read(manager_prefix.join("drive_c/windows/system32/d3d11.dll")).unwrap()
}

#[test]
fn gaming_bottle_walks_every_stage() {
    let harness = Harness::new();
    let deps = Arc::new(RecordingDependencies {
        failing: vec!["msls31".to_string()],
        ..Default::default()
    });
    let versioning = Arc::new(RecordingVersioning::default());
    let mut manager = harness
        .builder()
        .dependencies(deps.clone())
        .versioning(versioning.clone())
        .build();

    let mut request = BottleRequest::new("My Games", Environment::Gaming);
    request.versioning = true;
    let created = manager.create_bottle(&request).unwrap();

    assert_eq!(
        created.stages,
        vec![
            CreationStage::PathAllocated,
            CreationStage::DirectoryCreated,
            CreationStage::ConfigGenerated,
            CreationStage::EnvironmentApplied,
            CreationStage::PrefixInitialized,
            CreationStage::ComponentsInstalled,
            CreationStage::VersioningSeeded,
            CreationStage::Finalized,
        ]
    );

    let config = created.config;
    assert_eq!(config.name, "My Games");
    assert_eq!(config.path, "My-Games");
    assert_eq!(config.runner, RUNNER);
    assert_eq!(config.dxvk.as_deref(), Some(DXVK));
    assert!(config.parameters.dxvk);
    assert!(config.parameters.vkd3d);
    assert!(!config.parameters.dxvk_nvapi);
    assert_eq!(config.parameters.sync, SyncMode::Fsync);
    assert!(!config.installed_dependencies.contains(&"msls31".to_string()));
    assert!(config.installed_dependencies.contains(&"d3dx9".to_string()));
    assert_eq!(versioning.seeded.lock().unwrap().as_slice(), ["My Games"]);

    // The stored document matches what was returned.
    let prefix = manager.prefix(&config);
    let stored = BottleConfig::load(&BottleConfig::config_path(&prefix)).unwrap();
    assert_eq!(stored.installed_dependencies, config.installed_dependencies);

    // DXVK replaced the runner's d3d11 and kept the original aside.
    assert_eq!(d3d11(&prefix), format!("{DXVK}/x64/d3d11.dll").into_bytes());
    assert_eq!(
        fs::read(prefix.join("drive_c/windows/system32/d3d11.dll.bck")).unwrap(),
        BUILTIN
    );
    assert!(prefix.join("drive_c/windows/syswow64/d3d12.dll").is_file());
    assert_eq!(
        harness.registry.get("My Games", DLL_OVERRIDES, "d3d11").as_deref(),
        Some(NATIVE)
    );
    assert_eq!(harness.registry.get("My Games", DLL_OVERRIDES, "nvapi64"), None);
    assert!(
        harness
            .registry
            .get("My Games", NT_CURRENT_VERSION, "CurrentMajorVersionNumber")
            .is_some()
    );

    let lines = harness.command_lines();
    assert!(lines.contains(&"wine wineboot -i".to_string()));
    // Switching sync mode stops the server first.
    assert!(lines.contains(&"wineserver -k".to_string()));
    assert!(lines.contains(&"wineserver -w".to_string()));

    // A dependency failed, so this prefix is not reused.
    assert!(manager.templates().list().unwrap().is_empty());
}

#[test]
fn complete_gaming_bottle_is_cached_as_template() {
    let harness = Harness::new();
    let deps = Arc::new(RecordingDependencies::default());
    let mut manager = harness.builder().dependencies(deps).build();

    manager
        .create_bottle(&BottleRequest::new("Cached", Environment::Gaming))
        .unwrap();

    let templates = manager.templates().list().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].environment, "gaming-win64");
    assert!(templates[0].installed_dependencies.contains(&"msls31".to_string()));
}

#[test]
fn failed_dependency_is_installed_by_the_next_bottle() {
    let harness = Harness::new();
    let flaky = Arc::new(RecordingDependencies {
        failing: vec!["msls31".to_string()],
        ..Default::default()
    });
    let mut manager = harness.builder().dependencies(flaky).build();
    manager
        .create_bottle(&BottleRequest::new("First", Environment::Gaming))
        .unwrap();

    let working = Arc::new(RecordingDependencies::default());
    let mut manager = harness.builder().dependencies(working.clone()).build();
    let second = manager
        .create_bottle(&BottleRequest::new("Second", Environment::Gaming))
        .unwrap();

    assert!(second.stages.contains(&CreationStage::EnvironmentApplied));
    assert!(working.installed.lock().unwrap().contains(&"msls31".to_string()));
    assert!(
        second
            .config
            .installed_dependencies
            .contains(&"msls31".to_string())
    );
}

#[test]
fn second_bottle_reuses_template() {
    let harness = Harness::new();
    let deps = Arc::new(RecordingDependencies::default());
    let mut manager = harness.builder().dependencies(deps.clone()).build();

    let first = manager
        .create_bottle(&BottleRequest::new("First", Environment::Gaming))
        .unwrap();
    let installs_after_first = deps.installed.lock().unwrap().len();
    let calls_before = harness.mock.calls().len();

    let second = manager
        .create_bottle(&BottleRequest::new("Second", Environment::Gaming))
        .unwrap();

    assert!(second.stages.contains(&CreationStage::TemplateApplied));
    assert!(!second.stages.contains(&CreationStage::EnvironmentApplied));
    assert_eq!(deps.installed.lock().unwrap().len(), installs_after_first);
    assert_eq!(
        second.config.installed_dependencies,
        first.config.installed_dependencies
    );
    assert!(second.config.parameters.dxvk);

    let later: Vec<RecordedCall> = harness.mock.calls().split_off(calls_before);
    assert!(later.iter().any(|c| c.invokes("wineboot") && c.args[1] == "-u"));
    assert!(!later.iter().any(|c| c.invokes("wineboot") && c.args[1] == "-i"));

    // The unpacked prefix carries the first bottle's DLLs and backups.
    let prefix = manager.prefix(&second.config);
    assert_eq!(d3d11(&prefix), format!("{DXVK}/x64/d3d11.dll").into_bytes());
    assert!(prefix.join("drive_c/windows/system32/d3d11.dll.bck").is_file());
    assert_eq!(
        BottleConfig::load(&BottleConfig::config_path(&prefix)).unwrap().name,
        "Second"
    );
}

#[test]
fn custom_environment_is_not_cached() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let created = manager
        .create_bottle(&BottleRequest::new("Plain", Environment::Custom))
        .unwrap();
    assert!(created.stages.contains(&CreationStage::EnvironmentApplied));
    assert!(manager.templates().list().unwrap().is_empty());
    // Custom enables no DLL component.
    assert_eq!(d3d11(&manager.prefix(&created.config)), BUILTIN);
}

#[test]
fn path_collision_appends_suffix_to_name_and_dir() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    manager
        .create_bottle(&BottleRequest::new("Office", Environment::Custom))
        .unwrap();
    let again = manager
        .create_bottle(&BottleRequest::new("Office", Environment::Custom))
        .unwrap();

    let (name, suffix) = again.config.name.split_once("__").unwrap();
    assert_eq!(name, "Office");
    let suffix: u32 = suffix.parse().unwrap();
    assert!((100..=200).contains(&suffix));
    assert_eq!(again.config.path, format!("Office__{suffix}"));
    assert_eq!(manager.list_bottles().unwrap().len(), 2);
}

#[test]
fn unusable_name_is_rejected() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let err = manager
        .create_bottle(&BottleRequest::new("???", Environment::Custom))
        .unwrap_err();
    assert!(matches!(err, BottlesError::InvalidValue { .. }));
}

#[test]
fn custom_path_writes_placeholder_and_lists() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let elsewhere = harness.tmp.path().join("games-disk");
    let mut request = BottleRequest::new("Far Away", Environment::Custom);
    request.custom_path = Some(elsewhere.clone());

    let created = manager.create_bottle(&request).unwrap();
    assert!(created.stages.contains(&CreationStage::PlaceholderWritten));
    assert!(created.config.custom_path);
    assert!(elsewhere.join("Far-Away/bottle.json").is_file());
    assert!(
        harness
            .ctx
            .paths
            .bottles
            .join("Far-Away")
            .join(PLACEHOLDER_FILE)
            .is_file()
    );

    let listed = manager.find_bottle("Far Away").unwrap();
    assert_eq!(manager.prefix(&listed), elsewhere.join("Far-Away"));

    manager.delete_bottle(&listed).unwrap();
    assert!(!elsewhere.join("Far-Away").exists());
    assert!(manager.list_bottles().unwrap().is_empty());
}

#[test]
fn win32_bottle_gets_win7_and_no_syswow64() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let mut request = BottleRequest::new("Old", Environment::Custom);
    request.arch = Arch::Win32;
    let created = manager.create_bottle(&request).unwrap();
    assert_eq!(created.config.windows, "win7");
    assert_eq!(
        harness.registry.get("Old", NT_CURRENT_VERSION, "CurrentBuild").as_deref(),
        Some("\"7601\"")
    );
    assert!(
        !manager
            .prefix(&created.config)
            .join("drive_c/windows/syswow64")
            .exists()
    );
    let init = harness
        .mock
        .calls()
        .into_iter()
        .find(|c| c.invokes("wineboot"))
        .unwrap();
    assert_eq!(init.env_var("WINEARCH"), Some("win32"));
}

#[test]
fn missing_hives_time_out() {
    let harness = Harness::new();
    // Replace the prefix fake: wineboot "succeeds" but leaves no hives.
    let mut ctx = harness.ctx.clone();
    ctx.runner = Arc::new(bottles::command_runner::MockCommandRunner::new());
    let mut manager = bottles::manager::Manager::builder(ctx)
        .importer(harness.registry.clone())
        .build();

    let err = manager
        .create_bottle(&BottleRequest::new("Slow", Environment::Custom))
        .unwrap_err();
    assert!(matches!(err, BottlesError::HiveTimeout { .. }));
    // No rollback: the bottle directory and config stay behind.
    assert!(harness.ctx.paths.bottles.join("Slow/bottle.json").is_file());
}

#[test]
fn preflight_installs_missing_essentials() {
    let harness = Harness::empty();
    let catalog = Arc::new(DirCatalog {
        data: harness.data(),
        broken: false,
        installs: Mutex::new(Vec::new()),
    });
    let mut manager = harness
        .builder()
        .catalog(catalog.clone())
        .connectivity(Arc::new(Online))
        .build();

    manager.preflight().unwrap();

    let installs = catalog.installs.lock().unwrap().clone();
    assert_eq!(installs.len(), 4);
    assert!(installs.contains(&(ComponentKind::Runner, RUNNER.to_string())));
    assert!(installs.contains(&(ComponentKind::Dxvk, DXVK.to_string())));
    assert_eq!(manager.components().latest(ComponentKind::Nvapi), Some(NVAPI));
}

#[test]
fn preflight_gives_up_after_three_attempts() {
    let harness = Harness::empty();
    let catalog = Arc::new(DirCatalog {
        data: harness.data(),
        broken: true,
        installs: Mutex::new(Vec::new()),
    });
    let mut manager = harness
        .builder()
        .catalog(catalog.clone())
        .connectivity(Arc::new(Online))
        .build();

    let err = manager.preflight().unwrap_err();
    assert!(matches!(err, BottlesError::MissingEssentials { attempts: 3, .. }));
    // One install per missing kind per attempt.
    assert_eq!(catalog.installs.lock().unwrap().len(), 12);
}

#[test]
fn preflight_offline_fails_without_attempts() {
    let harness = Harness::empty();
    let mut manager = harness.manager();
    let err = manager
        .create_bottle(&BottleRequest::new("Nope", Environment::Custom))
        .unwrap_err();
    assert!(matches!(err, BottlesError::MissingEssentials { attempts: 0, .. }));
    assert!(!harness.ctx.paths.bottles.join("Nope").exists());
}

#[test]
fn toggle_installs_and_restores_originals() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let created = manager
        .create_bottle(&BottleRequest::new("Toggle", Environment::Custom))
        .unwrap();
    let prefix = manager.prefix(&created.config);
    assert_eq!(d3d11(&prefix), BUILTIN);

    let enabled = manager
        .toggle_component(&created.config, DllComponentKind::Dxvk, true)
        .unwrap();
    assert!(enabled.parameters.dxvk);
    assert_eq!(d3d11(&prefix), format!("{DXVK}/x64/d3d11.dll").into_bytes());
    // dxgi had no original: it is a plain override without backup.
    assert!(!prefix.join("drive_c/windows/system32/dxgi.dll.bck").exists());
    assert_eq!(
        harness.registry.get("Toggle", DLL_OVERRIDES, "dxgi").as_deref(),
        Some(NATIVE)
    );

    let disabled = manager
        .toggle_component(&enabled, DllComponentKind::Dxvk, false)
        .unwrap();
    assert!(!disabled.parameters.dxvk);
    assert_eq!(d3d11(&prefix), BUILTIN);
    assert!(!prefix.join("drive_c/windows/system32/d3d11.dll.bck").exists());
    assert!(!prefix.join("drive_c/windows/system32/dxgi.dll").exists());
    assert_eq!(harness.registry.get("Toggle", DLL_OVERRIDES, "dxgi"), None);
}

#[test]
fn install_respects_exclusions() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let created = manager
        .create_bottle(&BottleRequest::new("Picky", Environment::Custom))
        .unwrap();
    let options = InstallOptions {
        overrides_only: false,
        exclude: vec!["d3d11".to_string()],
    };
    let report = manager
        .install_dll_component(&created.config, DllComponentKind::Dxvk, false, None, &options)
        .unwrap();
    assert!(!report.overrides.contains(&"d3d11".to_string()));
    assert!(report.overrides.contains(&"d3d9".to_string()));
    assert_eq!(d3d11(&manager.prefix(&created.config)), BUILTIN);
}

#[test]
fn runner_update_rewrites_overrides_only() {
    let harness = Harness::new();
    install_component(&harness.data(), ComponentKind::Runner, "soda-9.1-1");
    let mut manager = harness.manager();
    let mut request = BottleRequest::new("Switch", Environment::Gaming);
    request.runner = Some(RUNNER.to_string());
    let created = manager.create_bottle(&request).unwrap();
    assert_eq!(created.config.runner, RUNNER);
    let prefix = manager.prefix(&created.config);
    let dll = prefix.join("drive_c/windows/system32/d3d11.dll");
    // A user-patched DLL must survive the runner switch.
    fs::write(&dll, b"patched").unwrap();
    harness.registry.forget("Switch");
    assert_eq!(harness.registry.get("Switch", DLL_OVERRIDES, "d3d11"), None);
    let calls_before = harness.mock.calls().len();
    let imports_before = harness.registry.import_count();

    let updated = manager
        .runner_update(&created.config, "soda-9.1-1")
        .unwrap();

    assert_eq!(updated.runner, "soda-9.1-1");
    assert_eq!(fs::read(&dll).unwrap(), b"patched");
    // dxvk and vkd3d each re-assert their overrides without copying files.
    assert_eq!(harness.registry.import_count(), imports_before + 2);
    assert_eq!(
        harness.registry.get("Switch", DLL_OVERRIDES, "d3d11").as_deref(),
        Some(NATIVE)
    );
    assert_eq!(
        harness.registry.get("Switch", DLL_OVERRIDES, "d3d12").as_deref(),
        Some(NATIVE)
    );

    let later: Vec<String> = harness
        .mock
        .calls()
        .split_off(calls_before)
        .iter()
        .map(RecordedCall::command_line)
        .collect();
    // The mocked server always answers, so every escalation step runs.
    assert_eq!(
        later,
        vec![
            "wineserver -k",
            "wineserver -w",
            "wineserver -k0",
            "wine wineboot -k",
            "wineserver -k0",
            "wineserver -k9",
            "wine wineboot -u",
        ]
    );
    let stored = manager.find_bottle("Switch").unwrap();
    assert_eq!(stored.runner, "soda-9.1-1");
}

#[test]
fn runner_update_skips_escalation_when_server_exits() {
    let harness = Harness::new();
    install_component(&harness.data(), ComponentKind::Runner, "soda-9.1-1");
    let mut manager = harness.manager();
    let mut request = BottleRequest::new("Quiet", Environment::Custom);
    request.runner = Some(RUNNER.to_string());
    let created = manager.create_bottle(&request).unwrap();
    harness.mock.exit_code("wineserver", 1);
    let calls_before = harness.mock.calls().len();

    manager.runner_update(&created.config, "soda-9.1-1").unwrap();

    let later: Vec<String> = harness
        .mock
        .calls()
        .split_off(calls_before)
        .iter()
        .map(RecordedCall::command_line)
        .collect();
    assert!(!later.iter().any(|l| l == "wineserver -k9"));
    assert!(!later.iter().any(|l| l == "wine wineboot -k"));
}

#[test]
fn runner_update_rejects_unknown_runner() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let created = manager
        .create_bottle(&BottleRequest::new("Stay", Environment::Custom))
        .unwrap();
    let err = manager
        .runner_update(&created.config, "proton-ge-1")
        .unwrap_err();
    assert!(matches!(err, BottlesError::RunnerNotFound(_)));
    assert_eq!(manager.find_bottle("Stay").unwrap().runner, RUNNER);
}

#[test]
fn repair_rebuilds_lost_config() {
    let harness = Harness::new();
    let manager = harness.manager();
    let prefix = harness.ctx.paths.bottles.join("Lost");
    fs::create_dir_all(prefix.join("drive_c/windows/syswow64")).unwrap();

    let config = manager.repair_bottle(&prefix).unwrap();
    assert_eq!(config.name, "Lost");
    assert_eq!(config.path, "Lost");
    assert!(!config.custom_path);
    assert_eq!(config.arch, Arch::Win64);
    assert_eq!(config.environment, Environment::Custom);
    assert_eq!(config.runner, RUNNER);
    assert!(prefix.join("bottle.json").is_file());
    assert_eq!(harness.command_lines(), vec!["wine wineboot -u"]);
}

#[test]
fn repair_refuses_missing_directory() {
    let harness = Harness::new();
    let manager = harness.manager();
    let prefix = harness.ctx.paths.bottles.join("Ghost");

    let err = manager.repair_bottle(&prefix).unwrap_err();
    assert!(matches!(err, BottlesError::BottleNotFound(_)));
    assert!(!prefix.exists());
    assert!(harness.command_lines().is_empty());
}

#[test]
fn windows_dpi_and_renderer_are_recorded() {
    let harness = Harness::new();
    let mut manager = harness.manager();
    let created = manager
        .create_bottle(&BottleRequest::new("Tweaks", Environment::Custom))
        .unwrap();

    let config = manager.set_windows(&created.config, "WinXP64").unwrap();
    assert_eq!(config.windows, "winxp64");
    let config = manager.set_dpi(&config, 120).unwrap();
    assert_eq!(config.parameters.dpi, 120);
    let config = manager.set_renderer(&config, "vulkan").unwrap();
    assert_eq!(config.parameters.renderer, "vulkan");

    assert!(matches!(
        manager.set_windows(&config, "win95"),
        Err(BottlesError::UnsupportedWindowsVersion { .. })
    ));
    assert!(manager.set_dpi(&config, 10).is_err());
    assert_eq!(manager.find_bottle("Tweaks").unwrap().parameters.dpi, 120);
}
