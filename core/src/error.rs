//! Error types for the resource client and collection store.
//!
//! # Design
//! The statuses a caller routinely branches on (404, 422, 409) get dedicated
//! variants carrying the server's structured `errorMessage` and
//! `errorDetails`. Every other unexpected status lands in `Http` with the raw
//! body. `Transport` is reported by the host when the round-trip itself
//! failed. The type is `Clone` so the store can keep the last failure around
//! for rendering.

use thiserror::Error;

use crate::types::ErrorDetail;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404: the item or collection does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The server rejected the payload (422, or a 400 for unreadable JSON).
    #[error("validation failed: {message}")]
    ValidationFailed {
        status: u16,
        message: String,
        details: Vec<ErrorDetail>,
    },

    /// The server returned 409: a unique field value is already taken.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Any other status the operation did not expect.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// HTTP status behind the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::ValidationFailed { status, .. } => Some(*status),
            ApiError::Conflict { .. } => Some(409),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Deserialization(_) | ApiError::Serialization(_) => {
                None
            }
        }
    }

    /// The server's `errorMessage`, or the fallback message for the status.
    pub fn message(&self) -> String {
        match self {
            ApiError::NotFound { message }
            | ApiError::ValidationFailed { message, .. }
            | ApiError::Conflict { message }
            | ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            ApiError::ValidationFailed { details, .. } => details,
            _ => &[],
        }
    }
}
