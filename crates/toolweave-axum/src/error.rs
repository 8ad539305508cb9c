//! Axum-specific error types and mappings.
//!
//! Library errors are mapped to HTTP status codes and a JSON body here and
//! nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use toolweave_automation::LoadError;
use toolweave_core::ValidationError;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rejected tool definitions, with every issue found.
    #[error("{0}")]
    InvalidDefinitions(ValidationError),

    /// Service unavailable (e.g. no browser controller attached).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<&'static str>,
    /// Optional additional metadata for specific error types
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message, error_type, metadata) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None, None),
            Self::InvalidDefinitions(err) => {
                let issues: Vec<_> = err
                    .issues()
                    .iter()
                    .map(|issue| json!({ "path": issue.path, "message": issue.message }))
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    err.to_string(),
                    Some("INVALID_DEFINITION"),
                    Some(json!({ "issues": issues })),
                )
            }
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None, None)
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), None, None),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type,
            metadata,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Arguments(_) => Self::BadRequest(err.to_string()),
            other => Self::InvalidDefinitions(other),
        }
    }
}

impl From<LoadError> for HttpError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Validation(e) => e.into(),
            LoadError::File { .. } => Self::BadRequest(err.to_string()),
            LoadError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}
