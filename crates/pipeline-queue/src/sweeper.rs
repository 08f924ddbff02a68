// crates/pipeline-queue/src/sweeper.rs
// ============================================================================
// Module: Stuck-job sweeper
// Description: Background task that periodically fails stuck `running` jobs.
// ============================================================================

//! Generalizes `original_source/backend/jobs/redis_queue.py`'s
//! `start_cleanup_thread` (a daemon `threading.Thread` sleeping
//! `CLEANUP_INTERVAL_SECONDS` between `cleanup_stuck_jobs` calls) into an
//! async Tokio task, matching the rest of this workspace's async runtime
//! choice (`pipeline-worker`'s loop, `pipeline-core::report_enforcer`'s
//! poll).

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing::warn;

use crate::JobQueue;

/// Runs the cleanup sweeper until the process exits (spec.md §4.3: "A
/// background sweeper runs every `CLEANUP_INTERVAL_SECONDS`").
///
/// Intended to be spawned as its own Tokio task alongside the worker loop;
/// never returns.
pub async fn run_cleanup_sweeper(
    queue: Arc<dyn JobQueue>,
    interval: Duration,
    timeout_minutes: i64,
) -> ! {
    loop {
        tokio::time::sleep(interval).await;
        match queue.cleanup_stuck_jobs(timeout_minutes) {
            Ok(cleaned) if !cleaned.is_empty() => {
                info!(count = cleaned.len(), "cleanup sweeper failed stuck jobs");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "cleanup sweeper failed to query stuck jobs");
            }
        }
    }
}
