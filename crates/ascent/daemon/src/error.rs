//! Error types for ascent-daemon

use ascent_core::OrchestratorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Registry loading error
    #[error("Registry error: {0}")]
    Registry(#[from] ascent_registry::RegistryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations
pub type DaemonResult<T> = std::result::Result<T, DaemonError>;

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An active run already exists for the bundle
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another advance is already in flight for the run
    #[error("Busy: {0}")]
    Busy(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::BundleNotFound(id) => {
                ApiError::NotFound(format!("Bundle {} not found", id))
            }
            OrchestratorError::RunNotFound(id) => {
                ApiError::NotFound(format!("Run {} not found", id))
            }
            OrchestratorError::Conflict { bundle_id, run_id } => match run_id {
                Some(run_id) => ApiError::Conflict(format!(
                    "Bundle {} already has active run {}",
                    bundle_id, run_id
                )),
                None => ApiError::Conflict(format!(
                    "A submission for bundle {} is already in progress",
                    bundle_id
                )),
            },
            OrchestratorError::Busy(id) => {
                ApiError::Busy(format!("Run {} has an advance in flight", id))
            }
            OrchestratorError::InvalidState { current, expected } => ApiError::Validation(format!(
                "Invalid run state: {}, expected one of: {:?}",
                current, expected
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Busy(_) => (StatusCode::LOCKED, "BUSY"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
