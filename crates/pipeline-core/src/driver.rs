// crates/pipeline-core/src/driver.rs
// ============================================================================
// Module: Step Driver
// Description: Backend-agnostic interface for a single pipeline step.
// ============================================================================

//! Generalizes `decision-gate-core::interfaces::EvidenceProvider` (a
//! backend-agnostic trait with multiple pluggable implementations) into "a
//! step reads prior promoted artifacts, writes pending artifacts, and
//! returns a structured outcome". Concrete implementations live in
//! `pipeline-drivers`.

use serde_json::Value;
use thiserror::Error;

use crate::identifiers::RunId;
use crate::identifiers::StepName;
use crate::store::ArtifactStore;

/// Everything a [`StepDriver`] needs to execute one attempt.
pub struct StepContext<'a> {
    /// The run this attempt belongs to.
    pub run_id: RunId,
    /// The step being executed.
    pub step: StepName,
    /// The attempt number, starting at 1.
    pub attempt: u32,
    /// Handle to the artifact store (drivers read prior promoted artifacts
    /// and write their own pending artifacts through this handle).
    pub store: &'a dyn ArtifactStore,
    /// Arbitrary run-scoped configuration (e.g. dataset path, thresholds)
    /// threaded through from the job payload.
    pub run_config: Value,
}

/// Errors a [`StepDriver`] may return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A required upstream artifact was not available.
    #[error("required artifact {0:?} unavailable")]
    ArtifactUnavailable(String),
    /// The driver's own computation failed.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),
    /// The driver detected an unrecoverable input problem and wants the
    /// orchestrator to degrade gracefully rather than retry.
    #[error("degraded: {reason}")]
    Degraded {
        /// Human-readable reason for degradation.
        reason: String,
        /// A minimal fallback artifact document to promote instead.
        fallback: Value,
    },
}

/// The outcome of a single driver invocation that completed without error.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Pending artifact documents produced this attempt, keyed by artifact
    /// name (without the `_pending` suffix — the orchestrator applies it).
    pub artifacts: Vec<(String, Value)>,
}

/// A single pipeline step's execution contract.
///
/// # Invariants
/// - Implementations must be side-effect-free with respect to the artifact
///   store beyond writing through `ctx.store`: no direct filesystem or
///   network access outside what the context exposes.
pub trait StepDriver: Send + Sync {
    /// Executes one attempt of the step.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] on any failure, including the graceful
    /// [`DriverError::Degraded`] variant.
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError>;
}
