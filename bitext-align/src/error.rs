//! Error types for bitext-align
//!
//! A stuck alignment is not an error here: it is a result
//! variant (`AlignmentOutcome::Degraded`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::embedding::EmbeddingError;

/// Failures that abort one alignment request
#[derive(Debug, Error)]
pub enum AlignError {
    /// Both sequences empty, or input that is not a list of texts
    #[error("Input mismatch: {0}")]
    InputMismatch(String),

    /// The oracle failed or returned malformed data; no partial matrix is used
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// bitext-common error (config, database, I/O)
    #[error(transparent)]
    Common(#[from] bitext_common::Error),

    /// CSV export failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for AlignError {
    fn from(err: sqlx::Error) -> Self {
        AlignError::Common(bitext_common::Error::Database(err))
    }
}

/// Result type for alignment operations
pub type AlignResult<T> = Result<T, AlignError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Embedding backend failed (502)
    #[error("Embedding backend failed: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AlignError> for ApiError {
    fn from(err: AlignError) -> Self {
        match err {
            AlignError::InputMismatch(msg) => ApiError::BadRequest(msg),
            AlignError::EmbeddingUnavailable(e) => ApiError::BadGateway(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INPUT_MISMATCH", msg),
            ApiError::BadGateway(msg) => {
                (StatusCode::BAD_GATEWAY, "EMBEDDING_UNAVAILABLE", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
