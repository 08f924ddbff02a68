// crates/pipeline-core/src/store.rs
// ============================================================================
// Module: Artifact Store trait
// Description: Backend-agnostic interface for the two-phase artifact store.
// ============================================================================

//! Defines the storage contract the orchestrator depends on. Concrete
//! backends (SQLite-backed, in-memory for tests) live in
//! `pipeline-store-sqlite` and here respectively.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

use crate::identifiers::ArtifactName;
use crate::identifiers::RunId;

/// Errors raised by an [`ArtifactStore`] implementation.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArtifactStoreError {
    /// The store backend is unavailable (disk full, connection lost, etc).
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
    /// The requested artifact does not exist.
    #[error("artifact not found: run={run_id} name={name}")]
    NotFound {
        /// Run identifier.
        run_id: String,
        /// Artifact name.
        name: String,
    },
    /// Serializing or deserializing the artifact payload failed.
    #[error("artifact serialization error: {0}")]
    Serialize(String),
}

/// A single named artifact belonging to a run.
///
/// # Invariants
/// - `name` and `run_id` have already passed identifier validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// Owning run.
    pub run_id: String,
    /// Artifact name (without any `_pending` suffix).
    pub name: String,
    /// Canonical JSON document payload.
    pub document: Value,
}

/// Two-phase artifact store: documents are written as `<name>_pending`,
/// validated, then promoted to `<name>` (or discarded).
///
/// # Invariants
/// - `read` observes every write previously committed through the same
///   store handle for the same run and name ("read-your-writes").
/// - `promote` and `discard_pending` are idempotent: calling either again
///   after success is a no-op, not an error.
pub trait ArtifactStore: Send + Sync {
    /// Writes (or overwrites) the pending copy of an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] when the backend cannot
    /// accept the write.
    fn write_pending(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        document: &Value,
    ) -> Result<(), ArtifactStoreError>;

    /// Promotes a previously written pending artifact to its final name.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::NotFound`] when no pending artifact
    /// exists, or [`ArtifactStoreError::Unavailable`] on a backend failure.
    fn promote(&self, run_id: &RunId, name: &ArtifactName) -> Result<(), ArtifactStoreError>;

    /// Discards a pending artifact without promoting it.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] on a backend failure.
    fn discard_pending(&self, run_id: &RunId, name: &ArtifactName)
        -> Result<(), ArtifactStoreError>;

    /// Reads a promoted artifact's document.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::NotFound`] when no promoted artifact
    /// exists under this name.
    fn read(&self, run_id: &RunId, name: &ArtifactName) -> Result<Value, ArtifactStoreError>;

    /// Appends to a promoted artifact, creating it if absent. Used for
    /// running ledgers such as `scope_constraints`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] on a backend failure.
    fn append(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        entry: &Value,
    ) -> Result<(), ArtifactStoreError>;

    /// Reports whether a promoted artifact exists.
    fn exists(&self, run_id: &RunId, name: &ArtifactName) -> bool;

    /// Atomically replaces the promoted value for `name`, bypassing the
    /// pending/validate/promote dance. Used for documents that are not
    /// subject to per-artifact validation: `orchestrator_state`,
    /// `run_manifest`, and synthesized/degraded fallbacks the orchestrator
    /// itself has already decided to accept.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] on a backend failure.
    fn write(&self, run_id: &RunId, name: &ArtifactName, document: &Value) -> Result<(), ArtifactStoreError>;

    /// Resolves an opaque on-disk location for a non-document artifact file
    /// (Markdown, PDF, PNG chart) scoped to `run_id`. Implementations MUST
    /// sanitize `filename` against traversal (no `..`, no path separators).
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Unavailable`] when `filename` is
    /// rejected or the backend cannot resolve a location.
    fn path(&self, run_id: &RunId, filename: &str) -> Result<PathBuf, ArtifactStoreError>;
}

/// Rejects empty names, `..`, and path separators before a filename is used
/// to build an on-disk location.
fn sanitize_filename(filename: &str) -> Result<&str, ArtifactStoreError> {
    let rejected = filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\');
    if rejected {
        return Err(ArtifactStoreError::Unavailable(format!(
            "rejected unsafe filename: {filename:?}"
        )));
    }
    Ok(filename)
}

/// In-process [`ArtifactStore`] used by tests and examples; not suitable for
/// multi-process deployments (see `pipeline-store-sqlite` for that).
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    pending: Mutex<HashMap<(String, String), Value>>,
    promoted: Mutex<HashMap<(String, String), Value>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> ArtifactStoreError {
        ArtifactStoreError::Unavailable("artifact store lock poisoned".to_owned())
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write_pending(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        document: &Value,
    ) -> Result<(), ArtifactStoreError> {
        let mut pending = self.pending.lock().map_err(|_| Self::lock_poisoned())?;
        pending.insert(
            (run_id.as_str().to_owned(), name.as_str().to_owned()),
            document.clone(),
        );
        Ok(())
    }

    fn promote(&self, run_id: &RunId, name: &ArtifactName) -> Result<(), ArtifactStoreError> {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        let mut pending = self.pending.lock().map_err(|_| Self::lock_poisoned())?;
        let Some(document) = pending.remove(&key) else {
            let mut promoted = self.promoted.lock().map_err(|_| Self::lock_poisoned())?;
            if promoted.contains_key(&key) {
                return Ok(());
            }
            return Err(ArtifactStoreError::NotFound {
                run_id: run_id.as_str().to_owned(),
                name: name.as_str().to_owned(),
            });
        };
        let mut promoted = self.promoted.lock().map_err(|_| Self::lock_poisoned())?;
        promoted.insert(key, document);
        Ok(())
    }

    fn discard_pending(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
    ) -> Result<(), ArtifactStoreError> {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        let mut pending = self.pending.lock().map_err(|_| Self::lock_poisoned())?;
        pending.remove(&key);
        Ok(())
    }

    fn read(&self, run_id: &RunId, name: &ArtifactName) -> Result<Value, ArtifactStoreError> {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        let promoted = self.promoted.lock().map_err(|_| Self::lock_poisoned())?;
        promoted
            .get(&key)
            .cloned()
            .ok_or_else(|| ArtifactStoreError::NotFound {
                run_id: run_id.as_str().to_owned(),
                name: name.as_str().to_owned(),
            })
    }

    fn append(
        &self,
        run_id: &RunId,
        name: &ArtifactName,
        entry: &Value,
    ) -> Result<(), ArtifactStoreError> {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        let mut promoted = self.promoted.lock().map_err(|_| Self::lock_poisoned())?;
        let slot = promoted
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => items.push(entry.clone()),
            other => {
                let previous = other.clone();
                *other = Value::Array(vec![previous, entry.clone()]);
            }
        }
        Ok(())
    }

    fn exists(&self, run_id: &RunId, name: &ArtifactName) -> bool {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        self.promoted
            .lock()
            .map(|promoted| promoted.contains_key(&key))
            .unwrap_or(false)
    }

    fn write(&self, run_id: &RunId, name: &ArtifactName, document: &Value) -> Result<(), ArtifactStoreError> {
        let key = (run_id.as_str().to_owned(), name.as_str().to_owned());
        let mut promoted = self.promoted.lock().map_err(|_| Self::lock_poisoned())?;
        promoted.insert(key, document.clone());
        Ok(())
    }

    fn path(&self, run_id: &RunId, filename: &str) -> Result<PathBuf, ArtifactStoreError> {
        let filename = sanitize_filename(filename)?;
        Ok(std::env::temp_dir()
            .join("pipeline-inmemory")
            .join(run_id.as_str())
            .join(filename))
    }
}
