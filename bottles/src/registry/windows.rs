//! Windows identities a bottle can report.
//!
//! Switching identity first deletes every value any catalog entry writes,
//! then writes the values of the target. The delete set is computed from the
//! catalog itself, so adding an identity or a field can never leave values
//! from a previous identity behind.

use serde::Serialize;

use crate::config::Arch;
use crate::error::{BottlesError, Result};
use crate::registry::bundle::{RegType, RegistryBundle};

pub const NT_CURRENT_VERSION: &str = r"HKEY_LOCAL_MACHINE\Software\Microsoft\Windows NT\CurrentVersion";
pub const NT_CURRENT_VERSION_WOW: &str =
    r"HKEY_LOCAL_MACHINE\Software\Wow6432Node\Microsoft\Windows NT\CurrentVersion";
pub const WIN9X_CURRENT_VERSION: &str = r"HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion";
pub const WIN9X_CURRENT_VERSION_WOW: &str =
    r"HKEY_LOCAL_MACHINE\Software\Wow6432Node\Microsoft\Windows\CurrentVersion";
pub const CONTROL_WINDOWS: &str = r"HKEY_LOCAL_MACHINE\System\CurrentControlSet\Control\Windows";
pub const PRODUCT_OPTIONS: &str = r"HKEY_LOCAL_MACHINE\System\CurrentControlSet\Control\ProductOptions";
/// The engine's own record of the configured identity.
pub const WINE_VERSION_KEY: &str = r"HKEY_CURRENT_USER\Software\Wine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Family {
    Nt {
        current_version: &'static str,
        build: &'static str,
        csd_version: &'static str,
        /// Service pack as the dword stored under `Control\Windows`.
        csd_hex: &'static str,
        product_type: Option<&'static str>,
        major_minor: Option<(u32, u32)>,
    },
    Win9x {
        version_number: &'static str,
        sub_version_number: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowsIdentity {
    pub id: &'static str,
    pub product_name: &'static str,
    pub family: Family,
    pub win32: bool,
    pub win64: bool,
}

#[allow(clippy::too_many_arguments)]
const fn nt(
    id: &'static str,
    product_name: &'static str,
    current_version: &'static str,
    build: &'static str,
    csd_version: &'static str,
    csd_hex: &'static str,
    product_type: Option<&'static str>,
    major_minor: Option<(u32, u32)>,
    arches: (bool, bool),
) -> WindowsIdentity {
    WindowsIdentity {
        id,
        product_name,
        family: Family::Nt {
            current_version,
            build,
            csd_version,
            csd_hex,
            product_type,
            major_minor,
        },
        win32: arches.0,
        win64: arches.1,
    }
}

const fn win9x(
    id: &'static str,
    product_name: &'static str,
    version_number: &'static str,
    sub_version_number: &'static str,
) -> WindowsIdentity {
    WindowsIdentity {
        id,
        product_name,
        family: Family::Win9x {
            version_number,
            sub_version_number,
        },
        win32: true,
        win64: false,
    }
}

const BOTH: (bool, bool) = (true, true);
const ONLY_32: (bool, bool) = (true, false);
const ONLY_64: (bool, bool) = (false, true);

/// Every supported identity, newest first.
pub const CATALOG: &[WindowsIdentity] = &[
    nt("win11", "Microsoft Windows 11", "6.3", "22000", "", "00000000", Some("WinNT"), Some((10, 0)), BOTH),
    nt("win10", "Microsoft Windows 10", "6.3", "19043", "", "00000000", Some("WinNT"), Some((10, 0)), BOTH),
    nt("win81", "Microsoft Windows 8.1", "6.3", "9600", "", "00000000", Some("WinNT"), Some((6, 3)), BOTH),
    nt("win8", "Microsoft Windows 8", "6.2", "9200", "", "00000000", Some("WinNT"), Some((6, 2)), BOTH),
    nt("win2008r2", "Microsoft Windows Server 2008 R2", "6.1", "7601", "Service Pack 1", "00000100", Some("ServerNT"), None, BOTH),
    nt("win7", "Microsoft Windows 7", "6.1", "7601", "Service Pack 1", "00000100", Some("WinNT"), None, BOTH),
    nt("win2008", "Microsoft Windows Server 2008", "6.0", "6002", "Service Pack 2", "00000200", Some("ServerNT"), None, BOTH),
    nt("vista", "Microsoft Windows Vista", "6.0", "6002", "Service Pack 2", "00000200", Some("WinNT"), None, BOTH),
    nt("win2003", "Microsoft Windows Server 2003", "5.2", "3790", "Service Pack 2", "00000200", Some("ServerNT"), None, BOTH),
    nt("winxp64", "Microsoft Windows XP", "5.2", "3790", "Service Pack 2", "00000200", Some("WinNT"), None, ONLY_64),
    nt("winxp", "Microsoft Windows XP", "5.1", "2600", "Service Pack 3", "00000300", None, None, ONLY_32),
    nt("win2k", "Microsoft Windows 2000", "5.0", "2195", "Service Pack 4", "00000400", None, None, ONLY_32),
    win9x("winme", "Microsoft Windows Millennium Edition", "4.90.3000", " "),
    win9x("win98", "Microsoft Windows 98", "4.10.2222", " A "),
    win9x("win95", "Microsoft Windows 95", "4.0.950", ""),
];

impl WindowsIdentity {
    /// Look up an identity by id.
    pub fn lookup(id: &str) -> Result<&'static WindowsIdentity> {
        CATALOG
            .iter()
            .find(|identity| identity.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| BottlesError::InvalidWindowsVersion(id.to_string()))
    }

    pub fn supports(&self, arch: Arch) -> bool {
        match arch {
            Arch::Win32 => self.win32,
            Arch::Win64 => self.win64,
        }
    }

    /// Values this identity writes on a bottle of `arch`.
    pub fn bundle(&self, arch: Arch) -> RegistryBundle {
        let mut bundle = RegistryBundle::new();
        match self.family {
            Family::Nt {
                current_version,
                build,
                csd_version,
                csd_hex,
                product_type,
                major_minor,
            } => {
                let mut keys = vec![NT_CURRENT_VERSION];
                if arch == Arch::Win64 {
                    keys.push(NT_CURRENT_VERSION_WOW);
                }
                for key in keys {
                    bundle
                        .add(key, "CSDVersion", csd_version)
                        .add(key, "CurrentBuild", build)
                        .add(key, "CurrentBuildNumber", build)
                        .add(key, "CurrentVersion", current_version)
                        .add(key, "ProductName", self.product_name);
                    if let Some((major, minor)) = major_minor {
                        bundle
                            .add_typed(key, "CurrentMajorVersionNumber", &format!("{major:08x}"), RegType::Dword)
                            .add_typed(key, "CurrentMinorVersionNumber", &format!("{minor:08x}"), RegType::Dword);
                    }
                }
                bundle.add_typed(CONTROL_WINDOWS, "CSDVersion", csd_hex, RegType::Dword);
                if let Some(product_type) = product_type {
                    bundle.add(PRODUCT_OPTIONS, "ProductType", product_type);
                }
            }
            Family::Win9x {
                version_number,
                sub_version_number,
            } => {
                let mut keys = vec![WIN9X_CURRENT_VERSION];
                if arch == Arch::Win64 {
                    keys.push(WIN9X_CURRENT_VERSION_WOW);
                }
                for key in keys {
                    bundle
                        .add(key, "ProductName", self.product_name)
                        .add(key, "VersionNumber", version_number)
                        .add(key, "SubVersionNumber", sub_version_number);
                }
            }
        }
        bundle.add(WINE_VERSION_KEY, "Version", self.id);
        bundle
    }
}

/// Bundle deleting every value any catalog identity writes on any arch.
pub fn delete_bundle() -> RegistryBundle {
    let mut bundle = RegistryBundle::new();
    for identity in CATALOG {
        for arch in [Arch::Win32, Arch::Win64] {
            for (key, entry) in identity.bundle(arch).entries() {
                bundle.delete(key, &entry.value);
            }
        }
    }
    bundle
}

/// Identity bundle for `id` on a bottle of `arch`, checking support.
pub fn identity_bundle(id: &str, arch: Arch) -> Result<RegistryBundle> {
    let identity = WindowsIdentity::lookup(id)?;
    if !identity.supports(arch) {
        return Err(BottlesError::UnsupportedWindowsVersion {
            version: id.to_string(),
            arch: arch.to_string(),
        });
    }
    Ok(identity.bundle(arch))
}
