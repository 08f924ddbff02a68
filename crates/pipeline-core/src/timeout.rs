// crates/pipeline-core/src/timeout.rs
// ============================================================================
// Module: Dataset-derived step timeout
// Description: The `base + k * size_mb`, capped formula from spec.md §4.6.
// ============================================================================

//! A single source of truth for the per-step timeout formula so
//! `pipeline_core::orchestrator` and `pipeline_config::EngineConfig` agree on
//! it. Grounded on the original implementation's `calculate_agent_timeout`
//! (SPEC_FULL.md §B.6): compute-intensive steps (`overseer`, `regression`,
//! `time_series`-equivalents) use a steeper per-megabyte multiplier than
//! ordinary steps.

use std::time::Duration;

/// Base dataset-derived timeout in seconds, before the per-megabyte term.
pub const DATASET_TIMEOUT_BASE_SECONDS: u64 = 900;
/// Timeout multiplier for compute-intensive steps (spec.md §4.6 `k=3`).
pub const DATASET_TIMEOUT_K_COMPUTE: u64 = 3;
/// Timeout multiplier for ordinary steps (spec.md §4.6 `k=2`).
pub const DATASET_TIMEOUT_K_DEFAULT: u64 = 2;
/// Hard cap on the dataset-derived timeout (spec.md §4.6, 1800s).
pub const DATASET_TIMEOUT_CAP_SECONDS: u64 = 1_800;

/// Computes `base + k * size_mb`, capped at [`DATASET_TIMEOUT_CAP_SECONDS`].
#[must_use]
pub fn dataset_derived_timeout(compute_intensive: bool, size_mb: f64) -> Duration {
    let k = if compute_intensive {
        DATASET_TIMEOUT_K_COMPUTE
    } else {
        DATASET_TIMEOUT_K_DEFAULT
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "size_mb is always non-negative and bounded by upstream file-size checks"
    )]
    let derived = DATASET_TIMEOUT_BASE_SECONDS + (k * size_mb.max(0.0).round() as u64);
    Duration::from_secs(derived.min(DATASET_TIMEOUT_CAP_SECONDS))
}

/// Computes `min(dataset_derived_timeout, step.time_budget_seconds)`
/// (spec.md §4.6).
#[must_use]
pub fn step_timeout(compute_intensive: bool, size_mb: f64, time_budget_seconds: u64) -> Duration {
    dataset_derived_timeout(compute_intensive, size_mb).min(Duration::from_secs(time_budget_seconds))
}

#[cfg(test)]
mod tests {
    use super::step_timeout;
    use std::time::Duration;

    #[test]
    fn caps_at_1800_seconds() {
        assert_eq!(step_timeout(true, 10_000.0, 5_000), Duration::from_secs(1_800));
    }

    #[test]
    fn uses_step_budget_when_smaller() {
        assert_eq!(step_timeout(false, 1.0, 100), Duration::from_secs(100));
    }

    #[test]
    fn compute_intensive_steps_use_larger_k() {
        assert!(step_timeout(true, 10.0, 10_000) > step_timeout(false, 10.0, 10_000));
    }
}
