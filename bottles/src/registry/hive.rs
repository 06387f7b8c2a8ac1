//! Registry hive files on disk.
//!
//! The runtime writes `user.reg` and `system.reg` into the prefix some time
//! after `wineboot` returns, so anything touching the registry first waits
//! for both to appear. [`HiveSnapshot`] parses either a hive or a `.reg`
//! export into a flat key/value view for diffing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{BottlesError, IoResultExt, Result};
use crate::registry::bundle::{self, RegistryBundle, escape};

/// The two hives a prefix must have before the registry can be edited.
pub const HIVES: [&str; 2] = ["user.reg", "system.reg"];

const WINE_HEADER: &str = "WINE REGISTRY Version 2";

/// Polling policy for hive files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiveWait {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HiveWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Block until both hives exist under `prefix`, or fail after `wait.timeout`.
pub fn wait_for_hives(prefix: &Path, wait: HiveWait) -> Result<()> {
    let start = Instant::now();
    let mut logged = false;
    loop {
        if HIVES.iter().all(|hive| prefix.join(hive).exists()) {
            return Ok(());
        }
        let waited = start.elapsed();
        if waited >= wait.timeout {
            return Err(BottlesError::HiveTimeout {
                prefix: prefix.to_path_buf(),
                waited,
            });
        }
        if !logged {
            info!(prefix = %prefix.display(), "Waiting for registry hives");
            logged = true;
        }
        thread::sleep(wait.interval.min(wait.timeout - waited));
    }
}

/// One value's location in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ValuePath {
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for ValuePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\\{}", self.key, self.value)
    }
}

/// Differences between two snapshots, as seen from the older one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HiveDiff {
    pub added: Vec<ValuePath>,
    pub removed: Vec<ValuePath>,
    pub changed: Vec<ValuePath>,
}

impl HiveDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Key -> value name -> raw data, as written after `=` in the file.
///
/// Key and value names compare case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HiveSnapshot {
    keys: BTreeMap<String, BTreeMap<String, String>>,
}

impl HiveSnapshot {
    pub fn parse(text: &str) -> Self {
        let mut snapshot = Self::default();
        snapshot.apply_reg_text(text);
        snapshot
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Ok(Self::parse(&text))
    }

    /// Copy `hive` to `<hive>.bck`, returning the backup path.
    pub fn backup(hive: &Path) -> Result<PathBuf> {
        let mut name = hive.as_os_str().to_os_string();
        name.push(".bck");
        let backup = PathBuf::from(name);
        fs::copy(hive, &backup).at(hive)?;
        debug!(hive = %hive.display(), backup = %backup.display(), "Backed up hive");
        Ok(backup)
    }

    pub fn get(&self, key: &str, value: &str) -> Option<&str> {
        self.keys.get(key)?.get(value).map(String::as_str)
    }

    pub fn values(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        self.keys.get(key)
    }

    pub fn len(&self) -> usize {
        self.keys.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a bundle as `regedit` would.
    pub fn apply_bundle(&mut self, bundle: &RegistryBundle) {
        self.apply_reg_text(&bundle.render(Default::default()));
    }

    /// Apply the statements of a hive or `.reg` document on top of this snapshot.
    pub fn apply_reg_text(&mut self, text: &str) {
        let mut wine_format = false;
        let mut current: Option<String> = None;
        for line in logical_lines(text) {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line == WINE_HEADER {
                wine_format = true;
                continue;
            }
            if line == "REGEDIT4" || line.starts_with("Windows Registry Editor") {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let Some(end) = rest.rfind(']') else {
                    current = None;
                    continue;
                };
                let raw = &rest[..end];
                let name = if wine_format {
                    bundle::unescape(raw)
                } else {
                    raw.to_string()
                };
                if let Some(deleted) = name.strip_prefix('-') {
                    let prefix = format!("{deleted}\\");
                    self.keys
                        .retain(|key, _| key != deleted && !key.starts_with(&prefix));
                    current = None;
                } else {
                    self.keys.entry(name.clone()).or_default();
                    current = Some(name);
                }
                continue;
            }
            let Some(key) = &current else {
                continue;
            };
            let Some((name, data)) = split_assignment(line) else {
                continue;
            };
            let values = self.keys.entry(key.clone()).or_default();
            if data == bundle::DELETE {
                values.remove(&name);
            } else {
                values.insert(name, data.to_string());
            }
        }
    }

    /// Value-level differences from `self` to `newer`.
    pub fn diff(&self, newer: &HiveSnapshot) -> HiveDiff {
        let mut diff = HiveDiff::default();
        for (key, values) in &self.keys {
            for (value, data) in values {
                let path = ValuePath {
                    key: key.clone(),
                    value: value.clone(),
                };
                match newer.get(key, value) {
                    None => diff.removed.push(path),
                    Some(new) if new != data => diff.changed.push(path),
                    Some(_) => {}
                }
            }
        }
        for (key, values) in &newer.keys {
            for value in values.keys() {
                if self.get(key, value).is_none() {
                    diff.added.push(ValuePath {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        diff
    }

    /// True when both snapshots hold the same values, ignoring empty keys.
    pub fn compare(&self, other: &HiveSnapshot) -> bool {
        self.diff(other).is_empty()
    }

    /// Render the snapshot back as a `.reg` document body.
    pub fn to_reg_text(&self) -> String {
        let mut out = String::new();
        for (key, values) in &self.keys {
            out.push_str(&format!("\n[{key}]\n"));
            for (value, data) in values {
                if value == "@" {
                    out.push_str(&format!("@={data}\n"));
                } else {
                    out.push_str(&format!("\"{}\"={data}\n", escape(value)));
                }
            }
        }
        out
    }
}

/// Join lines continued with a trailing backslash.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let trimmed = raw.trim_end();
        if !pending.is_empty() {
            pending.push_str(trimmed.trim_start());
        } else {
            pending.push_str(trimmed);
        }
        if pending.ends_with('\\') && is_hex_continuation(&pending) {
            pending.pop();
            continue;
        }
        lines.push(std::mem::take(&mut pending));
    }
    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

/// Only hex payloads wrap; a quoted string may legitimately end in `\`.
fn is_hex_continuation(line: &str) -> bool {
    split_assignment(line.trim_end_matches('\\'))
        .map(|(_, data)| data.starts_with("hex"))
        .unwrap_or(false)
}

/// Split `"name"=data` or `@=data` into the unescaped name and raw data.
fn split_assignment(line: &str) -> Option<(String, &str)> {
    if let Some(data) = line.strip_prefix("@=") {
        return Some(("@".to_string(), data));
    }
    let rest = line.strip_prefix('"')?;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                let name = bundle::unescape(&rest[..i]);
                let data = rest[i + 1..].strip_prefix('=')?;
                return Some((name, data));
            }
            _ => escaped = false,
        }
    }
    None
}
