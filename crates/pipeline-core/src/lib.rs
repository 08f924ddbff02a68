// crates/pipeline-core/src/lib.rs
// ============================================================================
// Module: Pipeline Core
// Description: Domain model and orchestration engine for the pipeline runner.
// Purpose: Define runs, artifacts, manifests, step registry/drivers, and the
//          orchestrator state machine that drives a run to completion.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! `pipeline-core` is transport- and storage-agnostic: it defines the data
//! model (run, step, artifact, manifest, job, progress, eligibility) and the
//! state machine that advances a run, but it depends only on the traits in
//! [`store`] and [`driver`] to touch the outside world. Concrete storage
//! (`pipeline-store-sqlite`), queueing (`pipeline-queue`), and analytic step
//! implementations (`pipeline-drivers`) are separate crates.
//!
//! Security posture: all identifiers accepted from external callers (run
//! ids, artifact names) are validated before use in any filesystem or SQL
//! operation; see [`identifiers`].

pub mod driver;
pub mod eligibility;
pub mod error;
pub mod identifiers;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod report_enforcer;
pub mod store;
pub mod time;
pub mod timeout;
pub mod validate;

pub use driver::{StepContext, StepDriver, StepOutcome};
pub use eligibility::{resolve_eligibility, EligibilityDecision, EligibilityInput};
pub use error::{OrchestratorError, ValidationError};
pub use identifiers::{ArtifactName, JobId, RunId, StepName};
pub use manifest::RunManifest;
pub use orchestrator::{
    DriverDispatch, Orchestrator, OrchestratorConfig, OrchestratorState, RegressionStatus,
    RunStatus, StepAttemptOutcome, StepRunStatus, StepState,
};
pub use progress::{calculate_progress, Progress};
pub use registry::{StepKind, StepRegistry, StepSpec};
pub use store::{Artifact, ArtifactStore, ArtifactStoreError};
pub use time::Timestamp;
