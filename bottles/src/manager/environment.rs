//! Environment recipes: parameter overrides and dependencies per environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::Environment;
use crate::error::{BottlesError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentRecipe {
    /// Values written under `parameters`
    #[serde(default, alias = "Parameters")]
    pub parameters: BTreeMap<String, Value>,
    /// Dependencies installed into the new bottle
    #[serde(default, alias = "Installed_Dependencies")]
    pub dependencies: Vec<String>,
}

impl EnvironmentRecipe {
    /// Recipe shipped for `environment`, if any.
    pub fn builtin(environment: Environment) -> Option<Self> {
        match environment {
            Environment::Gaming => Some(Self {
                parameters: BTreeMap::from([
                    ("dxvk".to_string(), json!(true)),
                    ("vkd3d".to_string(), json!(true)),
                    ("sync".to_string(), json!("fsync")),
                    ("discrete_gpu".to_string(), json!(true)),
                    ("pulseaudio_latency".to_string(), json!(true)),
                ]),
                dependencies: [
                    "d3dx9",
                    "msls31",
                    "arial32",
                    "times32",
                    "courie32",
                    "d3dcompiler_43",
                    "d3dcompiler_47",
                ]
                .map(String::from)
                .to_vec(),
            }),
            Environment::Application => Some(Self {
                parameters: BTreeMap::from([
                    ("dxvk".to_string(), json!(true)),
                    ("vkd3d".to_string(), json!(true)),
                ]),
                dependencies: ["arial32", "times32", "courie32", "mono", "gecko"]
                    .map(String::from)
                    .to_vec(),
            }),
            Environment::Custom | Environment::Steam => None,
        }
    }

    /// Load a user recipe from YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| BottlesError::InvalidRecipe {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|err| BottlesError::InvalidRecipe {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Recipe for a new bottle: a user file wins over the built-in one.
    pub fn resolve(environment: Environment, custom: Option<&Path>) -> Result<Option<Self>> {
        match custom {
            Some(path) => Self::from_file(path).map(Some),
            None => Ok(Self::builtin(environment)),
        }
    }
}
