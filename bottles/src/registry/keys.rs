//! Fixed registry bundles applied to every new prefix or on demand.

use crate::error::{BottlesError, Result};
use crate::registry::bundle::{RegType, RegistryBundle};

pub const DLL_OVERRIDES: &str = r"HKEY_CURRENT_USER\Software\Wine\DllOverrides";
pub const CMD_CONSOLE: &str = r"HKEY_CURRENT_USER\Console\C:_windows_system32_cmd.exe";
pub const DESKTOP: &str = r"HKEY_CURRENT_USER\Control Panel\Desktop";
pub const WINE_FONTS: &str = r"HKEY_CURRENT_USER\Software\Wine\Fonts";
pub const DIRECT3D: &str = r"HKEY_CURRENT_USER\Software\Wine\Direct3D";

/// Override directive preferring the component's DLL.
pub const NATIVE_BUILTIN: &str = "native,builtin";

pub const RENDERERS: &[&str] = &["gl", "vulkan", "gdi", "no3d"];

/// One bundle writing `directive` for each DLL base name.
pub fn dll_overrides<'a>(names: impl IntoIterator<Item = &'a str>, directive: &str) -> RegistryBundle {
    let mut bundle = RegistryBundle::new();
    for name in names {
        bundle.add(DLL_OVERRIDES, name, directive);
    }
    bundle
}

/// Readable defaults for `cmd.exe` windows.
pub fn cmd_settings() -> RegistryBundle {
    let mut bundle = RegistryBundle::new();
    bundle
        .add(CMD_CONSOLE, "FaceName", "Monospace")
        .add_typed(CMD_CONSOLE, "FontFamily", "00000036", RegType::Dword)
        .add_typed(CMD_CONSOLE, "FontSize", "00100000", RegType::Dword)
        .add_typed(CMD_CONSOLE, "FontWeight", "00000190", RegType::Dword)
        .add_typed(CMD_CONSOLE, "CursorSize", "00000019", RegType::Dword)
        .add_typed(CMD_CONSOLE, "HistoryBufferSize", "00000032", RegType::Dword)
        .add_typed(CMD_CONSOLE, "ScreenBufferSize", "01f40050", RegType::Dword)
        .add_typed(CMD_CONSOLE, "WindowSize", "00190050", RegType::Dword)
        .add_typed(CMD_CONSOLE, "QuickEdit", "00000001", RegType::Dword)
        .add_typed(CMD_CONSOLE, "InsertMode", "00000001", RegType::Dword)
        .add_typed(CMD_CONSOLE, "ScreenColors", "0000000f", RegType::Dword)
        .add_typed(CMD_CONSOLE, "PopupColors", "000000f5", RegType::Dword);
    bundle
}

pub fn dpi(dpi: u32) -> Result<RegistryBundle> {
    if !(48..=480).contains(&dpi) {
        return Err(BottlesError::InvalidValue {
            key: "dpi".to_string(),
            message: format!("{dpi} is outside 48..=480"),
        });
    }
    let data = format!("{dpi:08x}");
    let mut bundle = RegistryBundle::new();
    bundle
        .add_typed(DESKTOP, "LogPixels", &data, RegType::Dword)
        .add_typed(WINE_FONTS, "LogPixels", &data, RegType::Dword);
    Ok(bundle)
}

pub fn renderer(renderer: &str) -> Result<RegistryBundle> {
    if !RENDERERS.contains(&renderer) {
        return Err(BottlesError::InvalidValue {
            key: "renderer".to_string(),
            message: format!("expected one of {}, got '{renderer}'", RENDERERS.join(", ")),
        });
    }
    let mut bundle = RegistryBundle::new();
    bundle.add(DIRECT3D, "renderer", renderer);
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_batch_into_one_key() {
        let bundle = dll_overrides(["d3d11", "dxgi"], NATIVE_BUILTIN);
        assert_eq!(bundle.keys().count(), 1);
        assert_eq!(bundle.len(), 2);
        assert!(dll_overrides([], "-").is_empty());
    }

    #[test]
    fn dpi_is_written_as_dword() {
        let bundle = dpi(144).unwrap();
        assert_eq!(bundle.get(DESKTOP, "LogPixels").unwrap().data, "00000090");
        assert!(dpi(10).is_err());
    }

    #[test]
    fn renderer_is_validated() {
        assert!(renderer("vulkan").is_ok());
        assert!(matches!(renderer("dx12"), Err(BottlesError::InvalidValue { .. })));
    }

    #[test]
    fn cmd_settings_target_console_key() {
        let bundle = cmd_settings();
        assert_eq!(bundle.get(CMD_CONSOLE, "FaceName").unwrap().data, "Monospace");
        assert!(bundle.keys().all(|(key, _)| key == CMD_CONSOLE));
    }
}
