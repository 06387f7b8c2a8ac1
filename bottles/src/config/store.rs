//! Scoped mutation of a bottle's configuration.
//!
//! Every change goes through [`ConfigStore::update`]: the document is turned
//! into a JSON tree, one key is set or removed (at the top level or inside a
//! scope such as `parameters`), the tree is read back into a
//! [`BottleConfig`], stamped and written out whole.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::BottleConfig;
use crate::error::{BottlesError, Result};
use crate::external::{ManagedEnvironment, RuntimeServer};
use crate::settings::BottlesPaths;

/// Key whose change requires the runtime server to be down.
const SYNC_KEY: &str = "sync";

/// One key-level change.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    key: String,
    value: Value,
    scope: Option<String>,
    remove: bool,
    fallback: bool,
}

impl Update {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope: None,
            remove: false,
            fallback: false,
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            scope: None,
            remove: true,
            fallback: false,
        }
    }

    /// Apply inside a nested object such as `parameters`.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        self.scope = (!scope.is_empty()).then_some(scope);
        self
    }

    /// Keep an existing value and write under a fresh `{key}_{n}` instead.
    pub fn fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

pub struct ConfigStore {
    paths: BottlesPaths,
    server: Arc<dyn RuntimeServer>,
    managed: Option<Arc<dyn ManagedEnvironment>>,
}

impl ConfigStore {
    pub fn new(paths: BottlesPaths, server: Arc<dyn RuntimeServer>) -> Self {
        Self {
            paths,
            server,
            managed: None,
        }
    }

    pub fn with_managed(mut self, managed: Option<Arc<dyn ManagedEnvironment>>) -> Self {
        self.managed = managed;
        self
    }

    pub fn paths(&self) -> &BottlesPaths {
        &self.paths
    }

    /// Apply one change and persist the whole document.
    pub fn update(&self, config: &BottleConfig, update: Update) -> Result<BottleConfig> {
        if update.key == SYNC_KEY {
            debug!(bottle = %config.name, "Stopping runtime server before sync change");
            self.server.kill(config)?;
            self.server.wait(config)?;
        }

        let mut doc = serde_json::to_value(config)?;
        let Value::Object(root) = &mut doc else {
            return Err(BottlesError::InvalidValue {
                key: update.key,
                message: "configuration is not an object".to_string(),
            });
        };
        apply(root, &update)?;

        let mut updated: BottleConfig = serde_json::from_value(doc)?;
        updated.update_date = Utc::now();
        self.save(&updated)?;
        info!(
            bottle = %updated.name,
            key = %update.key,
            scope = update.scope.as_deref().unwrap_or(""),
            remove = update.remove,
            "Updated configuration"
        );

        if updated.environment.is_managed() {
            if let Some(managed) = &self.managed {
                managed.reconcile(&updated)?;
            } else {
                warn!(bottle = %updated.name, "No collaborator to reconcile managed environment");
            }
        }
        Ok(updated)
    }

    /// Write the document to `<bottle>/bottle.json`.
    pub fn save(&self, config: &BottleConfig) -> Result<()> {
        let path = BottleConfig::config_path(&self.paths.bottle_path(config));
        config.save(&path)
    }
}

fn apply(root: &mut Map<String, Value>, update: &Update) -> Result<()> {
    let target = match &update.scope {
        None => root,
        Some(scope) => {
            if update.remove && !root.contains_key(scope) {
                return Ok(());
            }
            let entry = root
                .entry(scope.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(BottlesError::InvalidValue {
                        key: scope.clone(),
                        message: "scope is not an object".to_string(),
                    });
                }
            }
        }
    };

    if update.remove {
        target.remove(&update.key);
        return Ok(());
    }
    let key = if update.fallback && target.contains_key(&update.key) {
        fallback_key(target, &update.key)
    } else {
        update.key.clone()
    };
    target.insert(key, update.value.clone());
    Ok(())
}

/// Smallest `{key}_{n}` (n >= 1) not present in `map`.
fn fallback_key(map: &Map<String, Value>, key: &str) -> String {
    (1..)
        .map(|n| format!("{key}_{n}"))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or_else(|| format!("{key}_0"))
}
