//! In-memory registry deltas and their `.reg` text rendering.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Data that deletes a value instead of setting it.
pub const DELETE: &str = "-";

/// Type tag for non-string values.
///
/// `Expand` and `Multi` data is expected as the comma-separated hex payload
/// regedit reads after the `hex(2):` / `hex(7):` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegType {
    Dword,
    Binary,
    Expand,
    Multi,
}

impl RegType {
    fn reg_prefix(&self) -> &'static str {
        match self {
            RegType::Dword => "dword:",
            RegType::Binary => "hex:",
            RegType::Expand => "hex(2):",
            RegType::Multi => "hex(7):",
        }
    }

    /// Type name understood by `reg add /t`.
    pub fn reg_flag(&self) -> &'static str {
        match self {
            RegType::Dword => "REG_DWORD",
            RegType::Binary => "REG_BINARY",
            RegType::Expand => "REG_EXPAND_SZ",
            RegType::Multi => "REG_MULTI_SZ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegEntry {
    pub value: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub kind: Option<RegType>,
}

impl RegEntry {
    pub fn is_delete(&self) -> bool {
        self.data == DELETE
    }
}

/// Header line of a rendered `.reg` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegHeader {
    Regedit4,
    #[default]
    Version5,
}

impl RegHeader {
    fn as_str(&self) -> &'static str {
        match self {
            RegHeader::Regedit4 => "REGEDIT4",
            RegHeader::Version5 => "Windows Registry Editor Version 5.00",
        }
    }
}

/// Ordered set of registry keys and the values to write under each.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryBundle {
    keys: Vec<(String, Vec<RegEntry>)>,
}

impl RegistryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string value.
    pub fn add(&mut self, key: &str, value: &str, data: &str) -> &mut Self {
        self.push(key, value, data, None)
    }

    pub fn add_typed(&mut self, key: &str, value: &str, data: &str, kind: RegType) -> &mut Self {
        self.push(key, value, data, Some(kind))
    }

    /// Delete a value.
    pub fn delete(&mut self, key: &str, value: &str) -> &mut Self {
        self.push(key, value, DELETE, None)
    }

    fn push(&mut self, key: &str, value: &str, data: &str, kind: Option<RegType>) -> &mut Self {
        let entry = RegEntry {
            value: value.to_string(),
            data: data.to_string(),
            kind,
        };
        let pos = match self.keys.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(pos) => pos,
            None => {
                self.keys.push((key.to_string(), Vec::new()));
                self.keys.len() - 1
            }
        };
        let entries = &mut self.keys[pos].1;
        match entries.iter_mut().find(|e| e.value.eq_ignore_ascii_case(value)) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self
    }

    /// Append every entry of `other`, later entries winning.
    pub fn extend(&mut self, other: &RegistryBundle) -> &mut Self {
        for (key, entry) in other.entries() {
            self.push(key, &entry.value, &entry.data, entry.kind);
        }
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, &[RegEntry])> {
        self.keys.iter().map(|(k, e)| (k.as_str(), e.as_slice()))
    }

    /// Flattened `(key, entry)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegEntry)> {
        self.keys
            .iter()
            .flat_map(|(k, entries)| entries.iter().map(move |e| (k.as_str(), e)))
    }

    pub fn get(&self, key: &str, value: &str) -> Option<&RegEntry> {
        self.entries()
            .find(|(k, e)| k.eq_ignore_ascii_case(key) && e.value.eq_ignore_ascii_case(value))
            .map(|(_, e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.iter().all(|(_, entries)| entries.is_empty())
    }

    pub fn len(&self) -> usize {
        self.keys.iter().map(|(_, entries)| entries.len()).sum()
    }

    /// Render as an importable `.reg` document.
    pub fn render(&self, header: RegHeader) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", header.as_str());
        for (key, entries) in &self.keys {
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "[{key}]");
            for entry in entries {
                let name = if entry.value == "@" {
                    "@".to_string()
                } else {
                    format!("\"{}\"", escape(&entry.value))
                };
                let data = match (entry.is_delete(), entry.kind) {
                    (true, _) => DELETE.to_string(),
                    (false, Some(kind)) => format!("{}{}", kind.reg_prefix(), entry.data),
                    (false, None) => format!("\"{}\"", escape(&entry.data)),
                };
                let _ = writeln!(out, "{name}={data}");
            }
        }
        out.push('\n');
        out
    }
}

/// Escape backslashes and quotes for a `.reg` string literal.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Inverse of [`escape`].
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_strings_types_and_deletes() {
        let mut bundle = RegistryBundle::new();
        bundle
            .add(r"HKEY_CURRENT_USER\Software\Wine\DllOverrides", "d3d11", "native,builtin")
            .delete(r"HKEY_CURRENT_USER\Software\Wine\DllOverrides", "dxgi")
            .add_typed(r"HKEY_CURRENT_USER\Control Panel\Desktop", "LogPixels", "00000060", RegType::Dword);

        let text = bundle.render(RegHeader::Version5);
        assert_eq!(
            text,
            "Windows Registry Editor Version 5.00\n\
             \n\
             [HKEY_CURRENT_USER\\Software\\Wine\\DllOverrides]\n\
             \"d3d11\"=\"native,builtin\"\n\
             \"dxgi\"=-\n\
             \n\
             [HKEY_CURRENT_USER\\Control Panel\\Desktop]\n\
             \"LogPixels\"=dword:00000060\n\
             \n"
        );
    }

    #[test]
    fn regedit4_header_and_escaping() {
        let mut bundle = RegistryBundle::new();
        bundle.add(r"HKEY_CURRENT_USER\Software\Test", "Path", r#"C:\Program Files\"x""#);
        let text = bundle.render(RegHeader::Regedit4);
        assert!(text.starts_with("REGEDIT4\n"));
        assert!(text.contains(r#""Path"="C:\\Program Files\\\"x\"""#));
        assert_eq!(unescape(&escape(r#"C:\a"b"#)), r#"C:\a"b"#);
    }

    #[test]
    fn repeated_values_replace_in_place() {
        let mut bundle = RegistryBundle::new();
        bundle.add("HKEY_CURRENT_USER\\Software\\Wine", "Version", "win7");
        bundle.add("HKEY_CURRENT_USER\\Software\\Wine", "version", "win10");
        assert_eq!(bundle.len(), 1);
        assert_eq!(
            bundle.get("HKEY_CURRENT_USER\\Software\\Wine", "Version").unwrap().data,
            "win10"
        );
    }

    #[test]
    fn empty_bundle() {
        let bundle = RegistryBundle::new();
        assert!(bundle.is_empty());
        assert_eq!(bundle.len(), 0);
    }
}
