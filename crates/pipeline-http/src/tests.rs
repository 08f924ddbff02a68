// crates/pipeline-http/src/tests.rs
// ============================================================================
// Module: HTTP handler tests
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use pipeline_queue::JobQueue;
use pipeline_queue::SqliteJobQueue;
use pipeline_store_sqlite::SqliteArtifactStore;
use tempfile::tempdir;

use crate::error::ApiError;
use crate::handlers;
use crate::handlers::ListJobsQuery;
use crate::handlers::SubmitRequest;
use crate::state::AppState;

fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("tempdir");
    let queue = SqliteJobQueue::open_in_memory().expect("open queue");
    let store = SqliteArtifactStore::open(&dir.path().join("store.db"), &dir.path().join("files"))
        .expect("open store");
    (AppState::new(Arc::new(queue), Arc::new(store)), dir)
}

#[tokio::test]
async fn submit_then_get_job_round_trips() {
    let (state, _dir) = test_state();
    let request = SubmitRequest {
        file_path: "uploads/data.csv".to_owned(),
        run_config: serde_json::json!({"target_column": "y"}),
    };
    let Json(response) = handlers::submit(State(state.clone()), Json(request)).await.expect("submit");

    let Json(job) = handlers::get_job(State(state), Path(response.run_id)).await.expect("get_job");
    let job = job.expect("job present");
    assert_eq!(job.file_path, "uploads/data.csv");
}

#[tokio::test]
async fn get_job_rejects_malformed_run_id() {
    let (state, _dir) = test_state();
    let result = handlers::get_job(State(state), Path("../etc/passwd".to_owned())).await;
    assert!(matches!(result, Err(ApiError::InvalidIdentifier(_))));
}

#[tokio::test]
async fn get_job_returns_none_for_unknown_run() {
    let (state, _dir) = test_state();
    let Json(job) = handlers::get_job(State(state), Path("a1b2c3d4e5f6".to_owned()))
        .await
        .expect("get_job");
    assert!(job.is_none());
}

#[tokio::test]
async fn get_state_reports_not_found_before_first_write() {
    let (state, _dir) = test_state();
    let result = handlers::get_state(State(state), Path("a1b2c3d4e5f6".to_owned())).await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[tokio::test]
async fn get_artifact_rejects_dotted_name() {
    let (state, _dir) = test_state();
    let result = handlers::get_artifact(
        State(state),
        Path(("a1b2c3d4e5f6".to_owned(), "report.json".to_owned())),
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidIdentifier(_))));
}

#[tokio::test]
async fn list_jobs_orders_newest_first() {
    let (state, _dir) = test_state();
    state.queue().enqueue("a.csv", serde_json::Value::Null).expect("enqueue a");
    state.queue().enqueue("b.csv", serde_json::Value::Null).expect("enqueue b");

    let Json(jobs) = handlers::list_jobs(
        State(state),
        Query(ListJobsQuery { limit: 10, offset: 0 }),
    )
    .await
    .expect("list_jobs");

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].file_path, "b.csv");
}
