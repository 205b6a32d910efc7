//! HTTP-facing error type.
//!
//! Every failure leaves the server as `{ errorMessage, errorDetails? }`.
//! Only validation failures carry details.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repository::RepositoryError;
use crate::validation::{ValidationDetail, ValidationFailure};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{}", .0.summary())]
    Validation(ValidationFailure),

    #[error("{0}")]
    Conflict(String),

    /// The request body could not be read as JSON.
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationFailure> for ServerError {
    fn from(failure: ValidationFailure) -> Self {
        ServerError::Validation(failure)
    }
}

impl From<RepositoryError> for ServerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { .. } => ServerError::Conflict(err.to_string()),
            RepositoryError::Storage(message) => ServerError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Vec<ValidationDetail>>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ServerError::Validation(failure) => ErrorBody {
                error_message: failure.summary(),
                error_details: Some(failure.details),
            },
            ServerError::Internal(message) => {
                error!(%message, "request failed");
                ErrorBody {
                    error_message: "internal server error".to_string(),
                    error_details: None,
                }
            }
            other => ErrorBody {
                error_message: other.to_string(),
                error_details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
