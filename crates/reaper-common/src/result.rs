//! Per-identifier deletion outcome
//!
//! Every attempted deletion produces exactly one [`NukeResult`], whether it
//! succeeded or not. Failures are carried as values so one bad identifier never
//! aborts its siblings.

use serde::Serialize;
use thiserror::Error;

/// Why a single identifier could not be deleted
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct DeleteError {
    /// Provider error code, when the provider returned one
    pub code: Option<String>,
    /// Human-readable failure description
    pub message: String,
}

impl DeleteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Outcome of one deletion attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NukeResult {
    /// Resource type name (registry key)
    pub resource_type: String,
    /// Identifier the deletion was attempted for
    pub identifier: String,
    /// `None` on success
    pub error: Option<DeleteError>,
}

impl NukeResult {
    pub fn success(resource_type: &str, identifier: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            identifier: identifier.into(),
            error: None,
        }
    }

    pub fn failure(resource_type: &str, identifier: impl Into<String>, error: DeleteError) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            identifier: identifier.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
