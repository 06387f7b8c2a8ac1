//! Status envelope handed to presentation layers.
//!
//! Library operations return `crate::error::Result<T>`; anything that renders
//! results for a user (the CLI `--json` mode, a GUI) converts them into an
//! [`OpResult`] so success and failure share one shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OpResult {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(Value::Null) => Self {
                status: true,
                data: None,
                message: None,
            },
            Ok(value) => Self {
                status: true,
                data: Some(value),
                message: None,
            },
            Err(err) => Self::failed(format!("Failed to serialize result: {err}")),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> From<Result<T>> for OpResult {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => OpResult::ok(data),
            Err(err) => OpResult::failed(err.to_string()),
        }
    }
}
