use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct SceError {
    pub code: String,
    pub message: String,
    /// Byte offset inside the script block, when the failure is tied to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

impl SceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            position: None,
        }
    }

    pub fn at(code: impl Into<String>, message: impl Into<String>, position: u64) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position.get_or_insert(position);
        self
    }
}
