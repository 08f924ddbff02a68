// crates/pipeline-core/src/error.rs
// ============================================================================
// Module: Error taxonomy
// Description: Stable error enums mapped onto spec error codes.
// ============================================================================

//! Centralizes the orchestrator- and validation-level error taxonomy. Every
//! variant name corresponds to an `ERR_*` code in the error-handling design.

use thiserror::Error;

use crate::identifiers::IdentifierError;

/// Errors raised while validating an artifact payload.
///
/// # Invariants
/// - Variants are stable for programmatic handling by callers that branch
///   on error code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing from the payload.
    #[error("missing field {field:?} in {artifact}")]
    MissingField {
        /// Artifact under validation.
        artifact: String,
        /// Missing field name.
        field: String,
    },
    /// A numeric field was present but not a number.
    #[error("metric {field:?} in {artifact} is not numeric")]
    MetricNotNumeric {
        /// Artifact under validation.
        artifact: String,
        /// Offending field name.
        field: String,
    },
    /// A numeric field fell outside its documented bounds.
    #[error("metric {field:?} in {artifact} is out of bounds: {value}")]
    MetricOutOfBounds {
        /// Artifact under validation.
        artifact: String,
        /// Offending field name.
        field: String,
        /// Observed value.
        value: f64,
    },
    /// A cross-field invariant was violated (e.g. `ci_low > ci_high`).
    #[error("cross-field invariant violated in {artifact}: {detail}")]
    CrossField {
        /// Artifact under validation.
        artifact: String,
        /// Human-readable description of the violated invariant.
        detail: String,
    },
    /// The named validator does not exist in the registry.
    #[error("no validator registered for artifact {0:?}")]
    UnknownArtifact(String),
}

impl ValidationError {
    /// Returns the stable error code used in manifest warnings and the
    /// external error taxonomy.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "METRIC_MISSING_FIELD",
            Self::MetricNotNumeric { .. } => "METRIC_NOT_NUMERIC",
            Self::MetricOutOfBounds { .. } => "METRIC_OUT_OF_BOUNDS",
            Self::CrossField { .. } => "CROSS_FIELD_INVARIANT",
            Self::UnknownArtifact(_) => "ARTIFACT_UNAVAILABLE",
        }
    }
}

/// Errors raised by the orchestrator state machine.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `code()` returns the
///   canonical `ERR_*` taxonomy string.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The step registry failed a load-time ordering invariant check.
    #[error("step registry invalid: {0}")]
    RegistryInvalid(String),
    /// An identifier supplied to the orchestrator failed validation.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// The run manifest had already been sealed.
    #[error("manifest already sealed for run {0}")]
    ManifestSealed(String),
    /// The run's `regression_status` field disagreed with the presence of a
    /// promoted regression artifact.
    #[error("regression status mismatch for run {0}")]
    StatusMismatch(String),
    /// A step exhausted its retry budget without producing a usable result.
    #[error("step {step} exhausted retries for run {run_id}")]
    RetriesExhausted {
        /// Run identifier.
        run_id: String,
        /// Step that exhausted retries.
        step: String,
    },
    /// The final report never appeared within the enforcement deadline.
    #[error("final report missing for run {0}")]
    ReportMissing(String),
    /// The underlying artifact store reported an error.
    #[error("artifact store error: {0}")]
    Store(String),
}

impl OrchestratorError {
    /// Returns the canonical `ERR_*` error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RegistryInvalid(_) => "ERR_REGISTRY_INVALID",
            Self::Identifier(_) => "ERR_INVALID_IDENTIFIER",
            Self::ManifestSealed(_) => "ERR_MANIFEST_SEALED",
            Self::StatusMismatch(_) => "ERR_STATUS_MISMATCH",
            Self::RetriesExhausted { .. } => "ERR_RETRIES_EXHAUSTED",
            Self::ReportMissing(_) => "ERR_REPORT_MISSING",
            Self::Store(_) => "ERR_STORE_UNAVAILABLE",
        }
    }
}
