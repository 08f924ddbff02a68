// crates/pipeline-queue/src/job.rs
// ============================================================================
// Module: Job
// Description: The Job Queue's record type and status enum (spec.md §3).
// ============================================================================

//! Grounded on `original_source/backend/jobs/models.py`'s `Job`/`JobStatus`
//! pair (reconstructed from `queue.py`/`redis_queue.py` call sites: the
//! source file itself is absent from the retrieval pack).

use pipeline_core::RunId;
use pipeline_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A job's lifecycle state, owned entirely by the Job Queue (spec.md §3
/// distinguishes this from the orchestrator's own `Run.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Enqueued, not yet claimed by a worker.
    Queued,
    /// Claimed by a worker; `fetch_next` moved it here atomically.
    Running,
    /// The orchestrator reached a terminal state and the worker reported it.
    Completed,
    /// The orchestrator raised an `ERR_*` the worker could not recover from,
    /// or the sweeper judged the job stuck.
    Failed,
}

impl JobStatus {
    /// Returns the lowercase wire value, matching the original
    /// implementation's `JobStatus.value` strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the wire value back, rejecting anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One submitted unit of work (spec.md §3 "Job").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Doubles as the run id: the queue and the orchestrator share one
    /// identifier space (matches the original implementation's `run_id` as
    /// primary key of the `jobs` table).
    pub run_id: RunId,
    /// Path or URI to the submitted dataset.
    pub file_path: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Last status message (e.g. a truncated failure reason).
    pub message: Option<String>,
    /// Filesystem location of the run's artifact tree, once known.
    pub run_path: Option<String>,
    /// Free-form run configuration (spec.md §6), threaded through to the
    /// orchestrator unopened.
    pub run_config: Value,
}
