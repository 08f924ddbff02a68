// crates/pipeline-queue/src/tests.rs
// ============================================================================
// Module: Crate-level integration smoke tests
// ============================================================================

use serde_json::json;

use crate::JobQueue;
use crate::JobStatus;
use crate::SqliteJobQueue;

#[test]
fn list_orders_newest_first_and_respects_pagination() {
    let queue = SqliteJobQueue::open_in_memory().expect("open");
    let first = queue.enqueue("a.csv", json!({})).expect("enqueue a");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = queue.enqueue("b.csv", json!({})).expect("enqueue b");

    let all = queue.list(10, 0).expect("list");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].run_id, second);
    assert_eq!(all[1].run_id, first);

    let page = queue.list(1, 1).expect("list page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].run_id, first);
}

#[test]
fn full_lifecycle_reaches_completed() {
    let queue = SqliteJobQueue::open_in_memory().expect("open");
    let run_id = queue
        .enqueue("data.csv", json!({"target_column": "revenue"}))
        .expect("enqueue");
    let job = queue.fetch_next().expect("fetch").expect("present");
    assert_eq!(job.status, JobStatus::Running);
    queue
        .update_status(&run_id, JobStatus::Completed, Some("complete"), Some("runs/abc"))
        .expect("update");
    let job = queue.get(&run_id).expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.run_path.as_deref(), Some("runs/abc"));
    assert_eq!(job.run_config["target_column"], "revenue");
}
