// crates/pipeline-queue/tests/redis_queue.rs
// ============================================================================
// Integration test: RedisJobQueue against a live Redis-compatible service.
// ============================================================================

//! Skipped unless `PIPELINE_TEST_REDIS_URL` is set, since unlike
//! `SqliteJobQueue::open_in_memory` there is no in-process Redis to open.
//! Point it at a throwaway instance, e.g. `redis://127.0.0.1:6379/15`.

use pipeline_queue::JobQueue;
use pipeline_queue::JobStatus;
use pipeline_queue::RedisJobQueue;

fn connect() -> Option<RedisJobQueue> {
    let url = std::env::var("PIPELINE_TEST_REDIS_URL").ok()?;
    Some(RedisJobQueue::open(&url).expect("connect to test redis"))
}

#[test]
fn enqueue_then_fetch_moves_to_running() {
    let Some(queue) = connect() else { return };
    let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
    let job = queue.fetch_next().expect("fetch").expect("job present");
    assert_eq!(job.run_id, run_id);
    assert_eq!(job.status, JobStatus::Running);
}

#[test]
fn update_status_clears_running_membership() {
    let Some(queue) = connect() else { return };
    let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
    queue.fetch_next().expect("fetch");
    queue
        .update_status(&run_id, JobStatus::Completed, Some("done"), Some("runs/x"))
        .expect("update");
    let job = queue.get(&run_id).expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.message.as_deref(), Some("done"));
    let cleaned = queue.cleanup_stuck_jobs(0).expect("cleanup");
    assert!(!cleaned.contains(&run_id));
}

#[test]
fn list_orders_newest_first() {
    let Some(queue) = connect() else { return };
    let first = queue.enqueue("a.csv", serde_json::json!({})).expect("enqueue");
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = queue.enqueue("b.csv", serde_json::json!({})).expect("enqueue");
    let jobs = queue.list(10, 0).expect("list");
    let position = |id: &pipeline_core::RunId| jobs.iter().position(|job| &job.run_id == id);
    assert!(position(&second) < position(&first));
}
