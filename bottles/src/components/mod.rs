//! Versioned runtime add-ons and their local availability.
//!
//! A component kind names one family of add-ons (runners, graphics shims,
//! runtimes). Each installed version lives in its own directory under
//! `<data>/<kind dir>/<version>`. The four DLL-shipping kinds additionally
//! know how to install themselves into a bottle, see [`dll`].

pub mod descriptor;
pub mod dll;
pub mod slot;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BottlesError, Result};
use crate::settings::BottlesPaths;

pub use descriptor::DllDescriptor;
pub use dll::{CheckedComponent, DllComponent, InstallOptions, InstallReport};
pub use slot::DllSlot;

/// Runner id reserved for the wine installation found on `PATH`.
pub const SYSTEM_WINE: &str = "sys-wine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Runner,
    Dxvk,
    Vkd3d,
    Nvapi,
    Latencyflex,
    Runtime,
    Bridge,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Runner,
        ComponentKind::Dxvk,
        ComponentKind::Vkd3d,
        ComponentKind::Nvapi,
        ComponentKind::Latencyflex,
        ComponentKind::Runtime,
        ComponentKind::Bridge,
    ];

    /// Kinds a bottle cannot be created without.
    pub const ESSENTIAL: [ComponentKind; 4] = [
        ComponentKind::Runner,
        ComponentKind::Dxvk,
        ComponentKind::Vkd3d,
        ComponentKind::Nvapi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Runner => "runner",
            ComponentKind::Dxvk => "dxvk",
            ComponentKind::Vkd3d => "vkd3d",
            ComponentKind::Nvapi => "nvapi",
            ComponentKind::Latencyflex => "latencyflex",
            ComponentKind::Runtime => "runtime",
            ComponentKind::Bridge => "bridge",
        }
    }

    /// Directory under the data dir holding every version of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ComponentKind::Runner => "runners",
            ComponentKind::Dxvk => "dxvk",
            ComponentKind::Vkd3d => "vkd3d",
            ComponentKind::Nvapi => "nvapi",
            ComponentKind::Latencyflex => "latencyflex",
            ComponentKind::Runtime => "runtimes",
            ComponentKind::Bridge => "winebridge",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The component kinds that ship DLL sets installed into a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DllComponentKind {
    Dxvk,
    Vkd3d,
    Nvapi,
    #[serde(rename = "latencyflex")]
    LatencyFlex,
}

impl DllComponentKind {
    pub const ALL: [DllComponentKind; 4] = [
        DllComponentKind::Dxvk,
        DllComponentKind::Vkd3d,
        DllComponentKind::Nvapi,
        DllComponentKind::LatencyFlex,
    ];

    pub fn component_kind(&self) -> ComponentKind {
        match self {
            DllComponentKind::Dxvk => ComponentKind::Dxvk,
            DllComponentKind::Vkd3d => ComponentKind::Vkd3d,
            DllComponentKind::Nvapi => ComponentKind::Nvapi,
            DllComponentKind::LatencyFlex => ComponentKind::Latencyflex,
        }
    }

    /// Key under `parameters` that enables this component.
    pub fn parameter(&self) -> &'static str {
        match self {
            DllComponentKind::Dxvk => "dxvk",
            DllComponentKind::Vkd3d => "vkd3d",
            DllComponentKind::Nvapi => "dxvk_nvapi",
            DllComponentKind::LatencyFlex => "latencyflex",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.component_kind().as_str()
    }
}

impl fmt::Display for DllComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DllComponentKind {
    type Err = BottlesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dxvk" => Ok(DllComponentKind::Dxvk),
            "vkd3d" => Ok(DllComponentKind::Vkd3d),
            "nvapi" | "dxvk_nvapi" => Ok(DllComponentKind::Nvapi),
            "latencyflex" => Ok(DllComponentKind::LatencyFlex),
            _ => Err(BottlesError::UnknownComponent(s.to_string())),
        }
    }
}

/// Compare two version ids so embedded numbers sort numerically.
///
/// `dxvk-2.10` sorts after `dxvk-2.9`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_number(&mut left);
                let rn = take_number(&mut right);
                let trimmed_l = ln.trim_start_matches('0');
                let trimmed_r = rn.trim_start_matches('0');
                let ord = trimmed_l
                    .len()
                    .cmp(&trimmed_r.len())
                    .then_with(|| trimmed_l.cmp(trimmed_r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Immutable view of locally installed component versions.
///
/// Built once by [`ComponentSnapshot::scan`]; holders keep a consistent view
/// even after the owner swaps in a newer snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentSnapshot {
    versions: BTreeMap<ComponentKind, Vec<String>>,
}

impl ComponentSnapshot {
    /// Scan the data directory for installed versions of every kind.
    pub fn scan(paths: &BottlesPaths, use_system_wine: bool) -> Self {
        let mut versions = BTreeMap::new();
        for kind in ComponentKind::ALL {
            let mut found = list_dirs(&paths.component_dir(kind));
            if kind == ComponentKind::Runner && use_system_wine && find_on_path("wine").is_some() {
                found.push(SYSTEM_WINE.to_string());
            }
            versions.insert(kind, found);
        }
        let snapshot = Self::from_versions(versions);
        debug!(?snapshot, "Scanned installed components");
        snapshot
    }

    /// Build a snapshot from explicit version lists, sorting each newest first.
    pub fn from_versions(versions: impl IntoIterator<Item = (ComponentKind, Vec<String>)>) -> Self {
        let mut map = BTreeMap::new();
        for (kind, mut list) in versions {
            list.sort_by(|a, b| natural_cmp(b, a));
            list.dedup();
            map.insert(kind, list);
        }
        Self { versions: map }
    }

    pub fn versions(&self, kind: ComponentKind) -> &[String] {
        self.versions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Newest installed version of a kind.
    pub fn latest(&self, kind: ComponentKind) -> Option<&str> {
        self.versions(kind).first().map(String::as_str)
    }

    pub fn contains(&self, kind: ComponentKind, version: &str) -> bool {
        self.versions(kind).iter().any(|v| v == version)
    }

    /// Essential kinds with no installed version.
    pub fn missing_essentials(&self) -> Vec<ComponentKind> {
        ComponentKind::ESSENTIAL
            .into_iter()
            .filter(|kind| self.versions(*kind).is_empty())
            .collect()
    }
}

fn list_dirs(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect()
}

/// Locate an executable on `PATH`.
pub fn find_on_path(program: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
