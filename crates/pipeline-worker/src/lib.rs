// crates/pipeline-worker/src/lib.rs
// ============================================================================
// Module: Pipeline Worker
// Description: Long-lived loop that dequeues runs and drives the orchestrator.
// Dependencies: pipeline-core, pipeline-drivers, pipeline-queue, tokio, tracing
// ============================================================================

//! Grounded on `original_source/backend/orchestrator.py`'s `main_loop` /
//! `orchestrate_new_run` pair: poll the queue, move the job to `running`,
//! invoke the orchestrator, and report the terminal status back (spec.md
//! §4.10's pseudocode). [`Orchestrator::run`] itself is a synchronous,
//! potentially long blocking call (spec.md §5 "Suspension points"), so each
//! iteration runs it on a blocking thread while a concurrent task emits
//! heartbeats — satisfying "the worker MUST heartbeat... at least every
//! `JOB_TIMEOUT_MINUTES/2`" (spec.md §4.10) without the orchestrator itself
//! depending on the Job Queue (spec.md §4.6 drivers/orchestrator must not
//! call the queue directly; seeDESIGN.md's Open Question note on this
//! split).

use std::sync::Arc;
use std::time::Duration;

use pipeline_config::EngineConfig;
use pipeline_core::Orchestrator;
use pipeline_core::OrchestratorConfig;
use pipeline_core::RunId;
use pipeline_core::StepRegistry;
use pipeline_core::orchestrator::DriverDispatch;
use pipeline_core::store::ArtifactStore;
use pipeline_queue::Job;
use pipeline_queue::JobQueue;
use pipeline_queue::JobStatus;
use tracing::error;
use tracing::info;
use tracing::warn;

/// How long `fetch_next` waits for a job before the loop re-checks for
/// shutdown (spec.md §4.10 pseudocode's `timeout=5s`).
const FETCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Truncated failure-message length recorded on the job (spec.md §4.10's
/// "truncated_reason").
const MAX_FAILURE_MESSAGE_LEN: usize = 500;

fn orchestrator_config(engine: &EngineConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        max_step_attempts: engine.max_step_attempts,
        retry_backoff: engine.retry_backoff,
        report_enforcer_max_wait: engine.report_enforcer_max_wait,
        drift_blocking: engine.drift_blocking,
    }
}

fn truncate(message: &str) -> String {
    if message.len() <= MAX_FAILURE_MESSAGE_LEN {
        message.to_owned()
    } else {
        let mut end = MAX_FAILURE_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &message[..end])
    }
}

/// Merges the job's `file_path` into `run_config` under `input_path`, the
/// key `pipeline_drivers::config::input_path` reads first.
fn run_config_with_input_path(job: &Job) -> serde_json::Value {
    let mut run_config = job.run_config.clone();
    if let serde_json::Value::Object(map) = &mut run_config {
        map.entry("input_path".to_owned())
            .or_insert_with(|| serde_json::Value::String(job.file_path.clone()));
    }
    run_config
}

/// Runs one iteration: fetch a job (if any), drive it to completion, report
/// status. Returns `true` if a job was processed.
///
/// # Errors
///
/// Propagates [`pipeline_queue::QueueError`] if the queue backend becomes
/// unavailable while fetching or updating job status.
pub fn process_one(
    queue: &dyn JobQueue,
    store: &dyn ArtifactStore,
    dispatch: &dyn DriverDispatch,
    engine: &EngineConfig,
) -> Result<bool, pipeline_queue::QueueError> {
    let Some(job) = queue.fetch_next()? else {
        return Ok(false);
    };
    info!(run_id = job.run_id.as_str(), "worker picked up job");

    let registry = StepRegistry::standard();
    let orchestrator = Orchestrator::new(registry, store, dispatch, orchestrator_config(engine));
    let run_config = run_config_with_input_path(&job);

    match orchestrator.run(&job.run_id, run_config) {
        Ok(state) => {
            let status_label = format!("{:?}", state.status());
            info!(run_id = job.run_id.as_str(), status = %status_label, "run reached terminal state");
            queue.update_status(&job.run_id, JobStatus::Completed, Some(&status_label), None)?;
        }
        Err(error) => {
            let message = truncate(&error.to_string());
            error!(run_id = job.run_id.as_str(), %message, "run failed with an orchestrator error");
            queue.update_status(&job.run_id, JobStatus::Failed, Some(&message), None)?;
        }
    }
    Ok(true)
}

/// Runs the worker loop until `shutdown` resolves (spec.md §4.10's
/// pseudocode). Spawns a concurrent heartbeat task for the duration of each
/// job's blocking execution.
///
/// # Panics
///
/// Never panics in normal operation; propagates a panic only if the
/// blocking orchestrator task itself panics (a programmer error in a
/// driver), matching `tokio::task::spawn_blocking`'s own contract.
pub async fn run_loop<Q, S, D>(
    queue: Arc<Q>,
    store: Arc<S>,
    dispatch: Arc<D>,
    engine: Arc<EngineConfig>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) where
    Q: JobQueue + 'static,
    S: ArtifactStore + 'static,
    D: DriverDispatch + 'static,
{
    loop {
        if shutdown.try_recv().is_ok() {
            info!("worker loop received shutdown signal");
            return;
        }

        let queue_for_fetch = Arc::clone(&queue);
        let peek = tokio::task::spawn_blocking(move || queue_for_fetch.fetch_next()).await;
        let job = match peek {
            Ok(Ok(Some(job))) => job,
            Ok(Ok(None)) => {
                tokio::time::sleep(FETCH_POLL_INTERVAL).await;
                continue;
            }
            Ok(Err(error)) => {
                warn!(%error, "queue unavailable; backing off");
                tokio::time::sleep(FETCH_POLL_INTERVAL).await;
                continue;
            }
            Err(error) => {
                warn!(%error, "fetch_next task panicked; backing off");
                tokio::time::sleep(FETCH_POLL_INTERVAL).await;
                continue;
            }
        };

        run_claimed_job(job, Arc::clone(&queue), Arc::clone(&store), Arc::clone(&dispatch), Arc::clone(&engine))
            .await;
    }
}

async fn run_claimed_job<Q, S, D>(
    job: Job,
    queue: Arc<Q>,
    store: Arc<S>,
    dispatch: Arc<D>,
    engine: Arc<EngineConfig>,
) where
    Q: JobQueue + 'static,
    S: ArtifactStore + 'static,
    D: DriverDispatch + 'static,
{
    info!(run_id = job.run_id.as_str(), "worker claimed job");
    let run_id = job.run_id.clone();
    let heartbeat_interval = Duration::from_secs(
        u64::try_from(engine.job_timeout_minutes.max(2) / 2).unwrap_or(1).max(1) * 60,
    );

    let heartbeat_queue = Arc::clone(&queue);
    let heartbeat_run_id = run_id.clone();
    let heartbeat_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(heartbeat_interval).await;
            if let Err(error) = heartbeat_queue.heartbeat(&heartbeat_run_id) {
                warn!(%error, "heartbeat failed");
            }
        }
    });

    let run_config = run_config_with_input_path(&job);
    let registry = StepRegistry::standard();
    let config = orchestrator_config(&engine);
    let run_result = tokio::task::spawn_blocking(move || {
        let orchestrator = Orchestrator::new(registry, store.as_ref(), dispatch.as_ref(), config);
        orchestrator.run(&job.run_id, run_config)
    })
    .await;

    heartbeat_task.abort();

    match run_result {
        Ok(Ok(state)) => {
            let status_label = format!("{:?}", state.status());
            info!(run_id = run_id.as_str(), status = %status_label, "run reached terminal state");
            if let Err(error) = queue.update_status(&run_id, JobStatus::Completed, Some(&status_label), None) {
                warn!(%error, "failed to report completion status");
            }
        }
        Ok(Err(error)) => {
            let message = truncate(&error.to_string());
            error!(run_id = run_id.as_str(), %message, "run failed with an orchestrator error");
            if let Err(error) = queue.update_status(&run_id, JobStatus::Failed, Some(&message), None) {
                warn!(%error, "failed to report failure status");
            }
        }
        Err(join_error) => {
            let message = truncate(&join_error.to_string());
            error!(run_id = run_id.as_str(), %message, "orchestrator task did not complete cleanly");
            if let Err(error) = queue.update_status(&run_id, JobStatus::Failed, Some(&message), None) {
                warn!(%error, "failed to report failure status");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pipeline_config::EngineConfig;
    use pipeline_drivers::StandardDrivers;
    use pipeline_queue::JobQueue;
    use pipeline_queue::JobStatus;
    use pipeline_queue::SqliteJobQueue;
    use pipeline_store_sqlite::SqliteArtifactStore;
    use tempfile::tempdir;

    use super::process_one;

    fn test_engine() -> EngineConfig {
        EngineConfig::from_reader(|name| {
            (name == "REDIS_URL").then(|| "sqlite://jobs.db".to_owned())
        })
        .expect("valid")
    }

    #[test]
    fn process_one_returns_false_when_queue_empty() {
        let queue = SqliteJobQueue::open_in_memory().expect("open queue");
        let dir = tempdir().expect("tempdir");
        let store = SqliteArtifactStore::open(&dir.path().join("store.db"), &dir.path().join("files"))
            .expect("open store");
        let dispatch = StandardDrivers::new();
        let engine = test_engine();
        let processed = process_one(&queue, &store, &dispatch, &engine).expect("process");
        assert!(!processed);
    }

    #[test]
    fn process_one_marks_job_completed_or_failed() {
        let queue = SqliteJobQueue::open_in_memory().expect("open queue");
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("missing.csv");
        let store = SqliteArtifactStore::open(&dir.path().join("store.db"), &dir.path().join("files"))
            .expect("open store");
        let dispatch = StandardDrivers::new();
        let engine = test_engine();

        let run_id = queue
            .enqueue(
                input.to_str().expect("utf8 path"),
                serde_json::json!({"fast_mode": true}),
            )
            .expect("enqueue");

        let processed = process_one(&queue, &store, &dispatch, &engine).expect("process");
        assert!(processed);

        let job = queue.get(&run_id).expect("get").expect("present");
        assert_ne!(job.status, JobStatus::Queued);
        assert_ne!(job.status, JobStatus::Running);
    }

    #[test]
    fn run_config_merges_file_path_as_input_path() {
        let job = pipeline_queue::Job {
            run_id: pipeline_core::RunId::new("deadbeef").expect("valid"),
            file_path: "uploads/data.csv".to_owned(),
            status: JobStatus::Running,
            created_at: pipeline_core::Timestamp::now(),
            updated_at: pipeline_core::Timestamp::now(),
            message: None,
            run_path: None,
            run_config: serde_json::json!({"target_column": "y"}),
        };
        let merged = super::run_config_with_input_path(&job);
        assert_eq!(merged["input_path"], "uploads/data.csv");
        assert_eq!(merged["target_column"], "y");
    }
}
