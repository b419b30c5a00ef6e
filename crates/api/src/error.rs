//! Transport-facing error.

use serde::{Deserialize, Serialize};

/// Failure reported to the caller: the error kind plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// `NotFound`, `PermissionDenied`, `InvalidTransition`, `InvalidGrade`,
    /// `Conflict`, `Storage` or `BadRequest`
    pub kind: String,
    /// Description
    pub message: String,
}

impl ApiError {
    /// Create an error.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Malformed request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", message)
    }

    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind.as_str() {
            "BadRequest" => 400,
            "PermissionDenied" => 403,
            "NotFound" => 404,
            "InvalidTransition" | "Conflict" => 409,
            "InvalidGrade" => 422,
            _ => 500,
        }
    }
}

impl From<labman_core::Error> for ApiError {
    fn from(err: labman_core::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}
