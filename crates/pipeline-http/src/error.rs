// crates/pipeline-http/src/error.rs
// ============================================================================
// Module: API errors
// Description: Maps core/queue/store errors onto HTTP status and the
//              `ERR_*` codes from spec.md §7.
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

/// Errors an HTTP handler can surface, each carrying a stable `ERR_*` code
/// (spec.md §7) and an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `run_id` or artifact name failed its identifier grammar (spec.md §6:
    /// "non-matching requests are rejected before any store access").
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// The requested run or artifact does not exist.
    #[error("not found")]
    NotFound,
    /// The Job Queue backend is unavailable.
    #[error(transparent)]
    Queue(#[from] pipeline_queue::QueueError),
    /// The Artifact Store backend is unavailable.
    #[error(transparent)]
    Store(#[from] pipeline_core::store::ArtifactStoreError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Returns the canonical `ERR_*` code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "ERR_VALIDATION_FAILED",
            Self::NotFound => "ERR_NOT_FOUND",
            Self::Queue(error) => error.code(),
            Self::Store(pipeline_core::store::ArtifactStoreError::NotFound { .. }) => {
                "ERR_NOT_FOUND"
            }
            Self::Store(_) => "ERR_STORE_UNAVAILABLE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(pipeline_core::store::ArtifactStoreError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Queue(_) | Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
