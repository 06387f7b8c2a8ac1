//! `wineboot` actions.

use tracing::info;

use crate::config::BottleConfig;
use crate::error::Result;
use crate::wine::Wine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAction {
    /// Create a fresh prefix.
    Init,
    /// Bring an existing prefix up to date with the runner.
    Update,
    /// Simulate a reboot so new processes see registry changes.
    Restart,
    /// Kill every process in the prefix.
    Kill,
}

impl BootAction {
    pub fn flag(&self) -> &'static str {
        match self {
            BootAction::Init => "-i",
            BootAction::Update => "-u",
            BootAction::Restart => "-r",
            BootAction::Kill => "-k",
        }
    }
}

impl Wine {
    pub fn wineboot(&self, config: &BottleConfig, action: BootAction) -> Result<()> {
        info!(bottle = %config.name, action = ?action, "wineboot");
        let mut options = self.options(config);
        if action == BootAction::Init {
            options = options.with_env("WINEARCH", config.arch.as_str());
        }
        self.run_with(config, &["wineboot", action.flag()], options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::MockCommandRunner;
    use crate::components::ComponentKind;
    use crate::config::Arch;
    use crate::context::Context;
    use crate::settings::Settings;
    use std::sync::Arc;

    #[test]
    fn init_sets_winearch() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let mock = Arc::new(MockCommandRunner::new());
        let ctx = Context::new(&settings, mock.clone());
        std::fs::create_dir_all(ctx.paths.component_dir(ComponentKind::Runner).join("soda")).unwrap();
        let wine = Wine::new(ctx);
        let config = BottleConfig::new("Old", "Old", Arch::Win32, "soda");

        wine.wineboot(&config, BootAction::Init).unwrap();
        wine.wineboot(&config, BootAction::Update).unwrap();

        let calls = mock.calls();
        assert_eq!(mock.command_lines(), vec!["wine wineboot -i", "wine wineboot -u"]);
        assert_eq!(calls[0].env_var("WINEARCH"), Some("win32"));
        assert_eq!(calls[1].env_var("WINEARCH"), None);
    }
}
