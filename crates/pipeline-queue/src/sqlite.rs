// crates/pipeline-queue/src/sqlite.rs
// ============================================================================
// Module: SQLite job queue
// Description: SQLite-WAL-backed JobQueue implementation.
// ============================================================================

//! Grounded on `original_source/backend/jobs/queue.py` for schema and FIFO
//! ordering, and on `backend/jobs/redis_queue.py` for heartbeat/timeout
//! semantics. `fetch_next` uses the same atomic-move approach the WAL
//! artifact store uses for promotion: a single transaction that reads the
//! oldest `queued` row and updates it to `running`, so two concurrent
//! connections never observe the same row as `queued` (SQLite's own
//! file-level locking plus `busy_timeout` arbitrates across processes —
//! the same concurrency boundary as `pipeline-store-sqlite`).

use std::path::Path;
use std::sync::Mutex;

use pipeline_core::RunId;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::QueueError;
use crate::job::Job;
use crate::job::JobStatus;

const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

fn unavailable(error: impl std::fmt::Display) -> QueueError {
    QueueError::Unavailable(error.to_string())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_owned())
}

/// A SQLite-WAL-backed [`crate::JobQueue`].
pub struct SqliteJobQueue {
    connection: Mutex<Connection>,
}

impl SqliteJobQueue {
    /// Opens (creating if absent) a SQLite job queue database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if the database cannot be opened
    /// or the schema cannot be initialized.
    pub fn open(db_path: &Path) -> Result<Self, QueueError> {
        let connection = Connection::open(db_path).map_err(unavailable)?;
        connection
            .busy_timeout(std::time::Duration::from_millis(u64::from(
                DEFAULT_BUSY_TIMEOUT_MS,
            )))
            .map_err(unavailable)?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(unavailable)?;
        connection
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(unavailable)?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS jobs (
                    run_id TEXT PRIMARY KEY,
                    file_path TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    message TEXT,
                    run_path TEXT,
                    run_config TEXT NOT NULL
                );",
            )
            .map_err(unavailable)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Opens an in-memory queue, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if schema initialization fails.
    pub fn open_in_memory() -> Result<Self, QueueError> {
        let connection = Connection::open_in_memory().map_err(unavailable)?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS jobs (
                    run_id TEXT PRIMARY KEY,
                    file_path TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    message TEXT,
                    run_path TEXT,
                    run_config TEXT NOT NULL
                );",
            )
            .map_err(unavailable)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, QueueError> {
        self.connection
            .lock()
            .map_err(|_| QueueError::Unavailable("sqlite connection lock poisoned".to_owned()))
    }

    fn row_to_job(
        run_id: String,
        file_path: String,
        status: String,
        created_at: String,
        updated_at: String,
        message: Option<String>,
        run_path: Option<String>,
        run_config: String,
    ) -> Result<Job, QueueError> {
        let run_id = RunId::new(run_id).map_err(|error| QueueError::Payload(error.to_string()))?;
        let status = JobStatus::parse(&status)
            .ok_or_else(|| QueueError::Payload(format!("unknown job status {status:?}")))?;
        let created_at = OffsetDateTime::parse(&created_at, &Rfc3339)
            .map_err(|error| QueueError::Payload(error.to_string()))?;
        let updated_at = OffsetDateTime::parse(&updated_at, &Rfc3339)
            .map_err(|error| QueueError::Payload(error.to_string()))?;
        let run_config: Value = serde_json::from_str(&run_config)
            .map_err(|error| QueueError::Payload(error.to_string()))?;
        Ok(Job {
            run_id,
            file_path,
            status,
            created_at: pipeline_core::Timestamp::from_offset_date_time(created_at),
            updated_at: pipeline_core::Timestamp::from_offset_date_time(updated_at),
            message,
            run_path,
            run_config,
        })
    }
}

impl crate::JobQueue for SqliteJobQueue {
    fn enqueue(&self, file_path: &str, run_config: Value) -> Result<RunId, QueueError> {
        let run_id = RunId::new(uuid_like_id()).map_err(|error| QueueError::Payload(error.to_string()))?;
        let now = now_rfc3339();
        let config_text =
            serde_json::to_string(&run_config).map_err(|error| QueueError::Payload(error.to_string()))?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO jobs (run_id, file_path, status, created_at, updated_at, run_config)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
                params![run_id.as_str(), file_path, JobStatus::Queued.as_str(), now, config_text],
            )
            .map_err(unavailable)?;
        Ok(run_id)
    }

    fn fetch_next(&self) -> Result<Option<Job>, QueueError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(unavailable)?;
        let row = tx
            .query_row(
                "SELECT run_id, file_path, status, created_at, updated_at, message, run_path, run_config
                 FROM jobs WHERE status = ?1 ORDER BY created_at LIMIT 1",
                params![JobStatus::Queued.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(unavailable)?;
        let Some((run_id, file_path, status, created_at, _updated_at, message, run_path, run_config)) = row
        else {
            return Ok(None);
        };
        let now = now_rfc3339();
        tx.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE run_id = ?3",
            params![JobStatus::Running.as_str(), now, run_id],
        )
        .map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;
        let job = Self::row_to_job(
            run_id,
            file_path,
            status,
            created_at,
            now,
            message,
            run_path,
            run_config,
        )?;
        Ok(Some(Job { status: JobStatus::Running, ..job }))
    }

    fn update_status(
        &self,
        run_id: &RunId,
        status: JobStatus,
        message: Option<&str>,
        run_path: Option<&str>,
    ) -> Result<(), QueueError> {
        let now = now_rfc3339();
        let connection = self.lock()?;
        connection
            .execute(
                "UPDATE jobs
                 SET status = ?1, updated_at = ?2,
                     message = COALESCE(?3, message),
                     run_path = COALESCE(?4, run_path)
                 WHERE run_id = ?5",
                params![status.as_str(), now, message, run_path, run_id.as_str()],
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn heartbeat(&self, run_id: &RunId) -> Result<(), QueueError> {
        let now = now_rfc3339();
        let connection = self.lock()?;
        connection
            .execute(
                "UPDATE jobs SET updated_at = ?1 WHERE run_id = ?2",
                params![now, run_id.as_str()],
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> Result<Option<Job>, QueueError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT run_id, file_path, status, created_at, updated_at, message, run_path, run_config
                 FROM jobs WHERE run_id = ?1",
                params![run_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(unavailable)?;
        row.map(|(run_id, file_path, status, created_at, updated_at, message, run_path, run_config)| {
            Self::row_to_job(run_id, file_path, status, created_at, updated_at, message, run_path, run_config)
        })
        .transpose()
    }

    fn list(&self, limit: u32, offset: u32) -> Result<Vec<Job>, QueueError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare(
                "SELECT run_id, file_path, status, created_at, updated_at, message, run_path, run_config
                 FROM jobs ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(unavailable)?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(unavailable)?;
        let mut jobs = Vec::new();
        for row in rows {
            let (run_id, file_path, status, created_at, updated_at, message, run_path, run_config) =
                row.map_err(unavailable)?;
            jobs.push(Self::row_to_job(
                run_id, file_path, status, created_at, updated_at, message, run_path, run_config,
            )?);
        }
        Ok(jobs)
    }

    fn cleanup_stuck_jobs(&self, timeout_minutes: i64) -> Result<Vec<RunId>, QueueError> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::minutes(timeout_minutes);
        let cutoff_text = cutoff.format(&Rfc3339).map_err(|error| QueueError::Payload(error.to_string()))?;
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare("SELECT run_id FROM jobs WHERE status = ?1 AND updated_at < ?2")
            .map_err(unavailable)?;
        let ids: Vec<String> = stmt
            .query_map(params![JobStatus::Running.as_str(), cutoff_text], |row| row.get(0))
            .map_err(unavailable)?
            .collect::<Result<_, _>>()
            .map_err(unavailable)?;
        let now = now_rfc3339();
        let message = format!("Job timed out after {timeout_minutes} minutes");
        let mut cleaned = Vec::with_capacity(ids.len());
        for run_id in ids {
            connection
                .execute(
                    "UPDATE jobs SET status = ?1, updated_at = ?2, message = ?3 WHERE run_id = ?4",
                    params![JobStatus::Failed.as_str(), now, message, run_id],
                )
                .map_err(unavailable)?;
            cleaned.push(RunId::new(run_id).map_err(|error| QueueError::Payload(error.to_string()))?);
        }
        Ok(cleaned)
    }

    fn queue_length(&self) -> Result<u64, QueueError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?1",
                params![JobStatus::Queued.as_str()],
                |row| row.get(0),
            )
            .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }
}

/// Generates an 8-hex-character run id (spec.md §4.3 "allocates a fresh
/// run_id (8-hex chars)"), without depending on a UUID crate: the teacher
/// workspace has no `uuid` dependency and spec.md only requires the token
/// to satisfy `^[a-f0-9-]{8,36}$`, not RFC 4122 structure. A process-local
/// counter is folded in so two calls within the same nanosecond never
/// collide within one process.
fn uuid_like_id() -> String {
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or_default();
    let pid = u64::from(std::process::id());
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = (nanos as u64) ^ (pid << 32) ^ counter;
    format!("{:08x}", mixed as u32)
}

#[cfg(test)]
mod tests {
    use pipeline_core::RunId;

    use super::SqliteJobQueue;
    use crate::JobQueue;
    use crate::JobStatus;

    #[test]
    fn enqueue_then_fetch_moves_to_running() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
        let job = queue.fetch_next().expect("fetch").expect("job present");
        assert_eq!(job.run_id, run_id);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn second_fetch_does_not_return_same_job() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
        let first = queue.fetch_next().expect("fetch").expect("present");
        let second = queue.fetch_next().expect("fetch");
        assert!(second.is_none());
        assert_eq!(first.status, JobStatus::Running);
    }

    #[test]
    fn fifo_ordering_is_respected() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let first = queue.enqueue("a.csv", serde_json::json!({})).expect("enqueue");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let _second = queue.enqueue("b.csv", serde_json::json!({})).expect("enqueue");
        let fetched = queue.fetch_next().expect("fetch").expect("present");
        assert_eq!(fetched.run_id, first);
    }

    #[test]
    fn update_status_is_idempotent_on_terminal_job() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
        queue.fetch_next().expect("fetch");
        queue
            .update_status(&run_id, JobStatus::Completed, Some("done"), Some("runs/x"))
            .expect("update");
        queue
            .update_status(&run_id, JobStatus::Completed, Some("done"), Some("runs/x"))
            .expect("update again");
        let job = queue.get(&run_id).expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message.as_deref(), Some("done"));
    }

    #[test]
    fn cleanup_stuck_jobs_fails_old_running_jobs() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
        queue.fetch_next().expect("fetch");
        // Force updated_at into the past by writing directly.
        {
            let connection = queue.connection.lock().expect("lock");
            connection
                .execute(
                    "UPDATE jobs SET updated_at = '2000-01-01T00:00:00Z' WHERE run_id = ?1",
                    rusqlite::params![run_id.as_str()],
                )
                .expect("backdate");
        }
        let cleaned = queue.cleanup_stuck_jobs(120).expect("cleanup");
        assert_eq!(cleaned, vec![run_id.clone()]);
        let job = queue.get(&run_id).expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.message.as_deref().unwrap_or_default().contains("timed out"));
    }

    #[test]
    fn heartbeat_does_not_change_status() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let run_id = queue.enqueue("data.csv", serde_json::json!({})).expect("enqueue");
        queue.fetch_next().expect("fetch");
        queue.heartbeat(&run_id).expect("heartbeat");
        let job = queue.get(&run_id).expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn unknown_job_returns_none() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        let run_id = RunId::new("deadbeef").expect("valid");
        assert!(queue.get(&run_id).expect("get").is_none());
    }

    #[test]
    fn queue_length_reflects_pending_jobs_only() {
        let queue = SqliteJobQueue::open_in_memory().expect("open");
        queue.enqueue("a.csv", serde_json::json!({})).expect("enqueue");
        queue.enqueue("b.csv", serde_json::json!({})).expect("enqueue");
        assert_eq!(queue.queue_length().expect("length"), 2);
        queue.fetch_next().expect("fetch");
        assert_eq!(queue.queue_length().expect("length"), 1);
    }
}
