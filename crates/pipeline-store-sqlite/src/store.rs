// crates/pipeline-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Artifact Store
// Description: Durable, multi-process ArtifactStore backed by SQLite WAL.
// ============================================================================

//! Grounded on the teacher store's WAL-mode + busy-timeout SQLite setup
//! (`decision-gate-store-sqlite/src/store.rs`) and on the original
//! implementation's `state_manager.py` atomic tmp-write + fsync + rename
//! pattern for the non-document half of the artifact contract (reports,
//! charts). Unlike the teacher store, there is no in-process writer thread:
//! each `pipeline-worker` process opens its own connection against the same
//! WAL file, and SQLite's own file locking plus `busy_timeout` arbitrates
//! concurrent writers across processes — the actual concurrency boundary
//! spec.md §5 describes (distinct workers, distinct processes).

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use pipeline_core::store::Artifact;
use pipeline_core::store::ArtifactStore;
use pipeline_core::store::ArtifactStoreError;
use pipeline_core::ArtifactName;
use pipeline_core::RunId;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use serde_json::Value;

/// Default SQLite busy timeout, matching the teacher store's default.
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Maps any `rusqlite` error to the store's backend-unavailable variant.
fn to_unavailable(error: impl std::fmt::Display) -> ArtifactStoreError {
    ArtifactStoreError::Unavailable(error.to_string())
}

/// A SQLite-WAL-backed [`ArtifactStore`].
///
/// # Invariants
/// - Opens in WAL journal mode with a busy timeout, so concurrent readers
///   never block a writer and vice versa within SQLite's own guarantees.
/// - `promote` is a single transaction: the pending row is deleted and the
///   promoted row is written atomically, so a concurrent reader never
///   observes a state with neither or both rows touched.
pub struct SqliteArtifactStore {
    connection: Mutex<Connection>,
    base_dir: PathBuf,
}

impl SqliteArtifactStore {
    /// Opens (creating if absent) a SQLite artifact store at `db_path`,
    /// with non-document artifact files resolved under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] if the database cannot be
    /// opened or the schema cannot be initialized.
    pub fn open(db_path: &Path, base_dir: &Path) -> Result<Self, ArtifactStoreError> {
        let connection = Connection::open(db_path).map_err(to_unavailable)?;
        connection
            .busy_timeout(std::time::Duration::from_millis(u64::from(
                DEFAULT_BUSY_TIMEOUT_MS,
            )))
            .map_err(to_unavailable)?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(to_unavailable)?;
        connection
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(to_unavailable)?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS artifacts (
                    run_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    pending INTEGER NOT NULL,
                    document TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (run_id, name, pending)
                );",
            )
            .map_err(to_unavailable)?;
        std::fs::create_dir_all(base_dir).map_err(to_unavailable)?;
        Ok(Self {
            connection: Mutex::new(connection),
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Locks the shared connection, mapping poisoning to a store error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ArtifactStoreError> {
        self.connection.lock().map_err(|_| {
            ArtifactStoreError::Unavailable("sqlite connection lock poisoned".to_owned())
        })
    }

    /// Inserts or replaces the row for `(run_id, name, pending)`.
    fn upsert_row(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        pending: bool,
        document: &Value,
    ) -> Result<(), ArtifactStoreError> {
        let connection = self.lock()?;
        let text = serde_json::to_string(document)
            .map_err(|error| ArtifactStoreError::Serialize(error.to_string()))?;
        connection
            .execute(
                "INSERT INTO artifacts (run_id, name, pending, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(run_id, name, pending) DO UPDATE SET
                   document = excluded.document,
                   updated_at = excluded.updated_at",
                params![run_id.as_str(), name.as_str(), i64::from(pending), text],
            )
            .map_err(to_unavailable)?;
        Ok(())
    }

    /// Reads the row for `(run_id, name, pending)`, if present.
    fn select_row(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        pending: bool,
    ) -> Result<Option<Value>, ArtifactStoreError> {
        let connection = self.lock()?;
        let text: Option<String> = connection
            .query_row(
                "SELECT document FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = ?3",
                params![run_id.as_str(), name.as_str(), i64::from(pending)],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_unavailable)?;
        match text {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .map_err(|error| ArtifactStoreError::Serialize(error.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Deletes the row for `(run_id, name, pending)`, if present.
    fn delete_row(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        pending: bool,
    ) -> Result<(), ArtifactStoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "DELETE FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = ?3",
                params![run_id.as_str(), name.as_str(), i64::from(pending)],
            )
            .map_err(to_unavailable)?;
        Ok(())
    }

    /// Lists every promoted artifact recorded for `run_id`, for diagnostic
    /// and manifest-reconciliation callers.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] on a backend failure.
    pub fn list_promoted(&self, run_id: &RunId) -> Result<Vec<Artifact>, ArtifactStoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT name, document FROM artifacts WHERE run_id = ?1 AND pending = 0 ORDER BY name",
            )
            .map_err(to_unavailable)?;
        let rows = statement
            .query_map(params![run_id.as_str()], |row| {
                let name: String = row.get(0)?;
                let text: String = row.get(1)?;
                Ok((name, text))
            })
            .map_err(to_unavailable)?;
        let mut artifacts = Vec::new();
        for row in rows {
            let (name, text) = row.map_err(to_unavailable)?;
            let document = serde_json::from_str(&text)
                .map_err(|error| ArtifactStoreError::Serialize(error.to_string()))?;
            artifacts.push(Artifact {
                run_id: run_id.as_str().to_owned(),
                name,
                document,
            });
        }
        Ok(artifacts)
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn write_pending(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        document: &Value,
    ) -> Result<(), ArtifactStoreError> {
        self.upsert_row(run_id, name, true, document)
    }

    fn promote(&self, run_id: &RunId, name: &ArtifactName) -> Result<(), ArtifactStoreError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction().map_err(to_unavailable)?;
        let pending: Option<String> = transaction
            .query_row(
                "SELECT document FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = 1",
                params![run_id.as_str(), name.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_unavailable)?;
        let Some(document) = pending else {
            let already_promoted: Option<i64> = transaction
                .query_row(
                    "SELECT 1 FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = 0",
                    params![run_id.as_str(), name.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(to_unavailable)?;
            if already_promoted.is_some() {
                return Ok(());
            }
            return Err(ArtifactStoreError::NotFound {
                run_id: run_id.as_str().to_owned(),
                name: name.as_str().to_owned(),
            });
        };
        transaction
            .execute(
                "DELETE FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = 1",
                params![run_id.as_str(), name.as_str()],
            )
            .map_err(to_unavailable)?;
        transaction
            .execute(
                "INSERT INTO artifacts (run_id, name, pending, document, updated_at)
                 VALUES (?1, ?2, 0, ?3, datetime('now'))
                 ON CONFLICT(run_id, name, pending) DO UPDATE SET
                   document = excluded.document,
                   updated_at = excluded.updated_at",
                params![run_id.as_str(), name.as_str(), document],
            )
            .map_err(to_unavailable)?;
        transaction.commit().map_err(to_unavailable)?;
        Ok(())
    }

    fn discard_pending(&self, run_id: &RunId, name: &ArtifactName) -> Result<(), ArtifactStoreError> {
        self.delete_row(run_id, name, true)
    }

    fn read(&self, run_id: &RunId, name: &ArtifactName) -> Result<Value, ArtifactStoreError> {
        self.select_row(run_id, name, false)?
            .ok_or_else(|| ArtifactStoreError::NotFound {
                run_id: run_id.as_str().to_owned(),
                name: name.as_str().to_owned(),
            })
    }

    fn append(&self, run_id: &RunId, name: &ArtifactName, entry: &Value) -> Result<(), ArtifactStoreError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction().map_err(to_unavailable)?;
        let current: Option<String> = transaction
            .query_row(
                "SELECT document FROM artifacts WHERE run_id = ?1 AND name = ?2 AND pending = 0",
                params![run_id.as_str(), name.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_unavailable)?;
        let current = current
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|error: serde_json::Error| ArtifactStoreError::Serialize(error.to_string()))?;
        let updated = match current {
            Some(Value::Array(mut items)) => {
                items.push(entry.clone());
                Value::Array(items)
            }
            Some(other) => Value::Array(vec![other, entry.clone()]),
            None => Value::Array(vec![entry.clone()]),
        };
        let text = serde_json::to_string(&updated)
            .map_err(|error| ArtifactStoreError::Serialize(error.to_string()))?;
        transaction
            .execute(
                "INSERT INTO artifacts (run_id, name, pending, document, updated_at)
                 VALUES (?1, ?2, 0, ?3, datetime('now'))
                 ON CONFLICT(run_id, name, pending) DO UPDATE SET
                   document = excluded.document,
                   updated_at = excluded.updated_at",
                params![run_id.as_str(), name.as_str(), text],
            )
            .map_err(to_unavailable)?;
        transaction.commit().map_err(to_unavailable)?;
        Ok(())
    }

    fn exists(&self, run_id: &RunId, name: &ArtifactName) -> bool {
        self.select_row(run_id, name, false)
            .unwrap_or(None)
            .is_some()
    }

    fn write(&self, run_id: &RunId, name: &ArtifactName, document: &Value) -> Result<(), ArtifactStoreError> {
        self.upsert_row(run_id, name, false, document)
    }

    fn path(&self, run_id: &RunId, filename: &str) -> Result<PathBuf, ArtifactStoreError> {
        let rejected = filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\');
        if rejected {
            return Err(ArtifactStoreError::Unavailable(format!(
                "rejected unsafe filename: {filename:?}"
            )));
        }
        let run_dir = self.base_dir.join("runs").join(run_id.as_str());
        std::fs::create_dir_all(&run_dir).map_err(to_unavailable)?;
        Ok(run_dir.join(filename))
    }
}
