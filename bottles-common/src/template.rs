use crate::error::CommonError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A cached bottle template for one environment kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Environment kind the template was created from (e.g. "gaming")
    pub environment: String,

    /// Archive file name, relative to the templates directory
    pub file: String,

    /// SHA256 checksum of the archive
    pub sha256: String,

    /// Dependencies already installed in the template
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installed_dependencies: Vec<String>,

    /// When this template was cached
    pub created_at: DateTime<Utc>,
}

/// Index of cached templates (templates/index.json).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemplateIndex {
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
}

impl TemplateIndex {
    /// Load an index from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, CommonError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let index: Self = serde_json::from_str(&content)?;
        Ok(index)
    }

    /// Save the index to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), CommonError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Find the template for an environment.
    pub fn find(&self, environment: &str) -> Option<&TemplateEntry> {
        self.templates
            .iter()
            .find(|t| t.environment.eq_ignore_ascii_case(environment))
    }

    /// Add or replace the template for an environment.
    pub fn upsert(&mut self, entry: TemplateEntry) {
        if let Some(existing) = self
            .templates
            .iter_mut()
            .find(|t| t.environment.eq_ignore_ascii_case(&entry.environment))
        {
            *existing = entry;
        } else {
            self.templates.push(entry);
        }
        self.templates
            .sort_by(|a, b| a.environment.cmp(&b.environment));
    }

    /// Remove the template for an environment.
    pub fn remove(&mut self, environment: &str) -> bool {
        let len_before = self.templates.len();
        self.templates
            .retain(|t| !t.environment.eq_ignore_ascii_case(environment));
        self.templates.len() != len_before
    }
}
