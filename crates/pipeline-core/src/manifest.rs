// crates/pipeline-core/src/manifest.rs
// ============================================================================
// Module: Run Manifest
// Description: Append-and-seal ledger of a run's steps, artifacts, warnings.
// ============================================================================

//! The run manifest is itself a promotable artifact (`run_manifest`). It
//! tracks per-step status, the list of promoted artifacts, deduplicated
//! warnings, a trust summary, and a seal flag that freezes it against
//! further mutation. Grounded on the `_finalize_*` family of functions in
//! the original orchestrator and on the append-only `RunState` record shape
//! used by the teacher's control plane.

use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::identifiers::RunId;
use crate::identifiers::StepName;
use crate::time::Timestamp;

/// The terminal-ish status recorded against a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet attempted.
    Pending,
    /// Currently executing.
    Running,
    /// Completed and its artifact(s) promoted.
    Promoted,
    /// Skipped with a recorded reason (e.g. ineligible).
    SkippedWithReason,
    /// Completed in a degraded mode with a fallback artifact.
    DegradedWithFallback,
    /// Failed after exhausting retries.
    Failed,
}

/// A deduplicated warning entry, keyed on `(code, path)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestWarning {
    /// Stable warning code (e.g. `HIGH_MULTICOLLINEARITY`).
    pub code: String,
    /// Path or artifact name the warning concerns.
    pub path: String,
    /// Human-readable detail.
    pub detail: String,
    /// Severity: `info`, `warning`, or `error`.
    pub severity: String,
}

/// Trust/governance summary recorded near the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustSummary {
    /// Aggregate trust score in `0..=100`.
    pub score: Option<u8>,
    /// Number of warnings rolled into the score.
    pub warning_count: u32,
    /// Number of errors rolled into the score.
    pub error_count: u32,
}

/// Errors raised while mutating a [`RunManifest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// The manifest was already sealed; the write was logged, not applied.
    #[error("manifest for run {0} is sealed")]
    Sealed(String),
}

/// The append-and-seal manifest for a single run.
///
/// # Invariants
/// - Once [`RunManifest::seal`] succeeds, every subsequent mutating call
///   returns [`ManifestError::Sealed`] and leaves the manifest unchanged.
/// - Warnings are deduplicated by `(code, path)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    run_id: String,
    initialized_at: Option<Timestamp>,
    steps: BTreeMap<String, StepStatus>,
    promoted_artifacts: Vec<String>,
    warnings: Vec<ManifestWarning>,
    trust: TrustSummary,
    sealed: bool,
    sealed_digest: Option<String>,
}

impl RunManifest {
    /// Creates an uninitialized manifest for `run_id`.
    #[must_use]
    pub fn new(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.as_str().to_owned(),
            initialized_at: None,
            steps: BTreeMap::new(),
            promoted_artifacts: Vec::new(),
            warnings: Vec::new(),
            trust: TrustSummary::default(),
            sealed: false,
            sealed_digest: None,
        }
    }

    /// Initializes the manifest, setting `initialized_at` the first time
    /// only (a no-op on subsequent calls).
    pub fn initialize(&mut self) {
        if self.initialized_at.is_none() {
            self.initialized_at = Some(Timestamp::now());
        }
    }

    /// Updates a step's status.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Sealed`] once the manifest has been sealed;
    /// the manifest is left unchanged.
    pub fn update_step_status(
        &mut self,
        step: &StepName,
        status: StepStatus,
    ) -> Result<(), ManifestError> {
        if self.sealed {
            return Err(ManifestError::Sealed(self.run_id.clone()));
        }
        self.steps.insert(step.as_str().to_owned(), status);
        Ok(())
    }

    /// Records a promoted artifact name.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Sealed`] once the manifest has been sealed.
    pub fn record_artifact(&mut self, name: &str) -> Result<(), ManifestError> {
        if self.sealed {
            return Err(ManifestError::Sealed(self.run_id.clone()));
        }
        if !self.promoted_artifacts.iter().any(|existing| existing == name) {
            self.promoted_artifacts.push(name.to_owned());
        }
        Ok(())
    }

    /// Adds a warning, deduplicated by `(code, path)`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Sealed`] once the manifest has been sealed.
    pub fn add_warning(&mut self, warning: ManifestWarning) -> Result<(), ManifestError> {
        if self.sealed {
            return Err(ManifestError::Sealed(self.run_id.clone()));
        }
        let duplicate = self
            .warnings
            .iter()
            .any(|existing| existing.code == warning.code && existing.path == warning.path);
        if !duplicate {
            self.warnings.push(warning);
        }
        Ok(())
    }

    /// Updates the trust summary.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Sealed`] once the manifest has been sealed.
    pub fn update_trust(&mut self, trust: TrustSummary) -> Result<(), ManifestError> {
        if self.sealed {
            return Err(ManifestError::Sealed(self.run_id.clone()));
        }
        self.trust = trust;
        Ok(())
    }

    /// Seals the manifest, computing a canonical content digest over the
    /// current state. Sealing is idempotent: sealing an already-sealed
    /// manifest is a no-op returning the existing digest.
    ///
    /// # Panics
    ///
    /// Never panics: the manifest always serializes successfully (it
    /// contains only plain data types).
    #[allow(clippy::missing_panics_doc, reason = "manifest fields are always serializable")]
    pub fn seal(&mut self) -> &str {
        if self.sealed {
            return self.sealed_digest.as_deref().unwrap_or_default();
        }
        self.sealed = true;
        let canonical =
            serde_jcs::to_string(&self).expect("run manifest always serializes to canonical JSON");
        let digest = sha256_hex(canonical.as_bytes());
        self.sealed_digest = Some(digest);
        self.sealed_digest.as_deref().unwrap_or_default()
    }

    /// Returns whether the manifest has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the recorded step statuses.
    #[must_use]
    pub fn steps(&self) -> &BTreeMap<String, StepStatus> {
        &self.steps
    }

    /// Returns the promoted artifact names.
    #[must_use]
    pub fn promoted_artifacts(&self) -> &[String] {
        &self.promoted_artifacts
    }

    /// Returns the deduplicated warning list.
    #[must_use]
    pub fn warnings(&self) -> &[ManifestWarning] {
        &self.warnings
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
