// crates/pipeline-queue/src/lib.rs
// ============================================================================
// Module: Pipeline Queue
// Description: FIFO job queue with atomic fetch_next, heartbeats, and a
//              stuck-job sweeper (spec.md §4.3).
// Dependencies: pipeline-core, rusqlite, tokio, tracing
// ============================================================================

//! Generalizes the teacher broker's "one trait, pluggable backends, a
//! selectable front" shape (`decision-gate-broker::CompositeBroker` routing
//! to `Source`/`Sink` implementations) into the [`JobQueue`] trait: one
//! interface, backed here by SQLite (see [`sqlite::SqliteJobQueue`]),
//! grounded on `original_source/backend/jobs/queue.py` (SQLite FIFO) and
//! `backend/jobs/redis_queue.py` (heartbeat + stuck-job sweep semantics,
//! spec.md §6 treats `REDIS_URL` as naming "a durable queue+cache service",
//! not mandating Redis specifically).

pub mod error;
pub mod job;
pub mod redis;
pub mod sqlite;
pub mod sweeper;

pub use error::QueueError;
pub use job::Job;
pub use job::JobStatus;
pub use redis::RedisJobQueue;
pub use sqlite::SqliteJobQueue;
pub use sweeper::run_cleanup_sweeper;

use pipeline_core::RunId;
use serde_json::Value;

/// The Job Queue's public contract (spec.md §4.3).
///
/// Implementations MUST be safe for multiple webserver writers and
/// multiple workers: `fetch_next` moves a job from `queued` to `running`
/// atomically, so two concurrent workers never both receive the same job
/// (spec.md §8 invariant 6).
pub trait JobQueue: Send + Sync {
    /// Allocates a fresh run id, records the job as `queued`, and appends it
    /// to the FIFO.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn enqueue(&self, file_path: &str, run_config: Value) -> Result<RunId, QueueError>;

    /// Atomically moves the oldest `queued` job to `running` and returns it,
    /// or `None` if no job is queued.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn fetch_next(&self) -> Result<Option<Job>, QueueError>;

    /// Moves `run_id` to `status`, optionally updating `message`/`run_path`.
    /// Idempotent: calling this on an already-terminal job just overwrites
    /// the fields given.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn update_status(
        &self,
        run_id: &RunId,
        status: JobStatus,
        message: Option<&str>,
        run_path: Option<&str>,
    ) -> Result<(), QueueError>;

    /// Refreshes `updated_at` without changing status, resetting the
    /// sweeper's timeout clock.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn heartbeat(&self, run_id: &RunId) -> Result<(), QueueError>;

    /// Looks up a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn get(&self, run_id: &RunId) -> Result<Option<Job>, QueueError>;

    /// Lists jobs newest-first, for the `list_jobs` external operation
    /// (spec.md §6).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn list(&self, limit: u32, offset: u32) -> Result<Vec<Job>, QueueError>;

    /// Transitions any `running` job whose `updated_at` is older than
    /// `timeout_minutes` to `failed`, returning the affected run ids.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn cleanup_stuck_jobs(&self, timeout_minutes: i64) -> Result<Vec<RunId>, QueueError>;

    /// Returns the number of jobs currently `queued` (spec.md §5
    /// backpressure observability).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend is unavailable.
    fn queue_length(&self) -> Result<u64, QueueError>;
}

#[cfg(test)]
mod tests;
