// crates/pipeline-queue/src/error.rs
// ============================================================================
// Module: Queue errors
// ============================================================================

use thiserror::Error;

/// Errors raised by a [`crate::JobQueue`] implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue backend is unreachable (spec.md §7 `ERR_QUEUE_UNAVAILABLE`).
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
    /// A value could not be serialized/deserialized to or from storage.
    #[error("queue payload error: {0}")]
    Payload(String),
}

impl QueueError {
    /// Returns the canonical `ERR_*` error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "ERR_QUEUE_UNAVAILABLE",
            Self::Payload(_) => "ERR_QUEUE_UNAVAILABLE",
        }
    }
}
