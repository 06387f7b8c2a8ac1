//! Error types for bottle operations.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bottles_common::error::CommonError;
use thiserror::Error;

use crate::components::ComponentKind;

#[derive(Error, Debug)]
pub enum BottlesError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize bottle config: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown component: '{0}'")]
    UnknownComponent(String),

    #[error("No {0} version selected for this bottle")]
    ComponentNotSelected(ComponentKind),

    #[error("Invalid Windows version: '{0}'")]
    InvalidWindowsVersion(String),

    #[error("Windows version '{version}' is not supported on {arch} bottles")]
    UnsupportedWindowsVersion { version: String, arch: String },

    #[error("Missing essential components after {attempts} attempts: {missing}")]
    MissingEssentials { missing: String, attempts: u32 },

    #[error("Invalid environment recipe {path}: {message}")]
    InvalidRecipe { path: PathBuf, message: String },

    #[error("Timed out after {waited:?} waiting for registry hives in {prefix}")]
    HiveTimeout { prefix: PathBuf, waited: Duration },

    #[error("Command `{command}` failed: {status}")]
    CommandFailed { command: String, status: String },

    #[error("Runner not found: {0}")]
    RunnerNotFound(String),

    #[error("Bottle not found: {0}")]
    BottleNotFound(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("{0}")]
    Collaborator(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

pub type Result<T, E = BottlesError> = std::result::Result<T, E>;

/// Attach the offending path to an `io::Error`.
pub trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| BottlesError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
