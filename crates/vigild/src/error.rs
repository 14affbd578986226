//! Error types for the vigild HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil_alerts::AlertError;
use vigil_config::ConfigError;

/// Errors surfaced through the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A configuration document failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An alerting-core operation failed.
    #[error(transparent)]
    Alert(#[from] AlertError),
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body returned for every API error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error category.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Config(_) => (StatusCode::BAD_REQUEST, "invalid_config"),
            Self::Alert(err) => match err {
                AlertError::SilenceNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                AlertError::InvalidSilence { .. } | AlertError::InvalidMatcher { .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_request")
                }
                AlertError::SerializationError(_) | AlertError::StorageError { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category) = self.status();
        let body = ErrorResponse {
            error: category.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
