// crates/pipeline-core/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Drives one run through the step registry to a terminal state.
// ============================================================================

//! Re-architects the original implementation's `main_loop` /
//! `orchestrate_new_run` (subprocess-per-step, thread-per-run) into a single
//! in-process state machine, per the "subprocess-per-step -> in-process
//! plugin" redesign flag. Generalizes the teacher control plane's pattern of
//! a generic engine driven by trait objects
//! (`ControlPlane<Provider, Dispatcher, Store, Policy>`) into a concrete
//! engine over [`StepDriver`] and [`ArtifactStore`].
//!
//! One call to [`Orchestrator::run`] drives a run from wherever
//! `orchestrator_state` says it left off to a terminal status. Because every
//! step records a terminal status before the next one starts, a second call
//! after a partial failure resumes rather than repeating completed work.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::driver::DriverError;
use crate::driver::StepContext;
use crate::driver::StepDriver;
use crate::eligibility::EligibilityInput;
use crate::eligibility::resolve_eligibility;
use crate::error::OrchestratorError;
use crate::identifiers::ArtifactName;
use crate::identifiers::RunId;
use crate::identifiers::StepName;
use crate::manifest::ManifestWarning;
use crate::manifest::RunManifest;
use crate::manifest::StepStatus as ManifestStepStatus;
use crate::progress::Progress;
use crate::progress::calculate_progress;
use crate::registry::StepRegistry;
use crate::report_enforcer::FINAL_REPORT_ARTIFACT;
use crate::store::ArtifactStore;
use crate::time::Timestamp;
use crate::validate::ValidationReport;
use crate::validate::validate_by_name;

/// Maximum number of attempts the orchestrator gives a single step,
/// including the first.
pub const MAX_STEP_ATTEMPTS: u32 = 3;

/// Artifact name the orchestrator persists its state snapshot under.
pub const ORCHESTRATOR_STATE_ARTIFACT: &str = "orchestrator_state";

/// Artifact name the manifest is persisted under (the manifest is itself a
/// promotable-looking artifact with its own sealing rules).
pub const RUN_MANIFEST_ARTIFACT: &str = "run_manifest";

/// Artifact names subject to two-phase validation + promotion (spec.md
/// §4.7's "artifact promotion policy" list). Anything a driver writes under
/// a different name is promoted without a registered validator running
/// (see [`validate_by_name`]'s `UnknownArtifact` fallthrough).
const REGRESSION_BUNDLE_ARTIFACTS: &[&str] = &[
    "regression_summary",
    "feature_importance",
    "collinearity_report",
    "leakage_report",
    "feature_governance",
    "baseline_metrics",
];

/// Bounded tail length for captured stdout/stderr, per spec.md §3.
const MAX_TAIL_BYTES: usize = 2000;

/// Clamps captured driver output to [`MAX_TAIL_BYTES`], splitting on a char
/// boundary.
fn truncate_tail(text: &str) -> String {
    if text.len() <= MAX_TAIL_BYTES {
        text.to_owned()
    } else {
        let mut end = MAX_TAIL_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_owned()
    }
}

/// Per-step run status, matching spec.md §3's `Step.status` vocabulary. This
/// is distinct from [`ManifestStepStatus`]: the manifest tracks a
/// promotion-oriented view (`Promoted`/`DegradedWithFallback`/...) while this
/// tracks the client-facing lifecycle of the step itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    /// Not yet attempted this run.
    Pending,
    /// Currently executing (persisted before the driver is invoked).
    Running,
    /// Finished successfully (including degraded-with-fallback).
    Completed,
    /// Exhausted its retry budget without success.
    Failed,
    /// Ineligible and explicitly skipped.
    Skipped,
    /// Ineligible because it does not apply to this dataset/run shape.
    NotApplicable,
}

impl StepRunStatus {
    /// Whether this status is terminal: a step in a terminal status is never
    /// re-run within the same run (spec.md §3 invariant).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Whether this status counts as "completed" for progress-percentage
    /// purposes (spec.md §3: skipped/not_applicable count as completed for
    /// pipeline advancement).
    #[must_use]
    fn counts_as_completed(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped | Self::NotApplicable | Self::Failed
        )
    }
}

/// Per-step run-state record, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    /// Current lifecycle status.
    pub status: StepRunStatus,
    /// Attempts made so far, capped at [`MAX_STEP_ATTEMPTS`].
    pub attempts: u32,
    /// When the step first started running.
    pub started_at: Option<Timestamp>,
    /// When the step reached a terminal status.
    pub completed_at: Option<Timestamp>,
    /// Wall-clock runtime in whole seconds, once terminal.
    pub runtime_seconds: Option<i64>,
    /// Bounded stdout tail (<= [`MAX_TAIL_BYTES`]).
    pub stdout_tail: String,
    /// Bounded stderr tail (<= [`MAX_TAIL_BYTES`]).
    pub stderr_tail: String,
    /// Human-readable status message.
    pub message: Option<String>,
    /// Eligibility verdict recorded for this step ("eligible", "skipped",
    /// "not_applicable").
    pub eligibility_status: Option<String>,
    /// Machine-readable reason code (e.g. `VALIDATION_BLOCKED`, `TIMEOUT`).
    pub reason_code: Option<String>,
}

impl StepState {
    /// Returns a freshly initialized, not-yet-attempted step state.
    fn pending() -> Self {
        Self {
            status: StepRunStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            runtime_seconds: None,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
            message: None,
            eligibility_status: None,
            reason_code: None,
        }
    }
}

/// Coarse run status, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not yet picked up by a worker.
    Queued,
    /// Currently being driven by [`Orchestrator::run`].
    Running,
    /// Every step completed with no failures.
    Complete,
    /// Finished with one or more non-critical step failures.
    CompleteWithErrors,
    /// A critical step failed, or the Report Enforcer rejected completion.
    Failed,
}

/// Derived coherence field, per spec.md §4.7: `regression_status == success`
/// iff the promoted regression insights artifact exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionStatus {
    /// The regression step has not yet run.
    NotStarted,
    /// The regression step is the `current_step`.
    Running,
    /// The regression step completed and promoted its summary.
    Success,
    /// The regression step failed or degraded without a promoted summary.
    Failed,
}

/// One entry in the state's append-only history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Step the event concerns, or `None` for run-level events.
    pub step: Option<String>,
    /// Short event kind, e.g. `"run_initialized"`, `"step_completed"`.
    pub kind: String,
    /// When the event was recorded.
    pub at: Timestamp,
}

/// The orchestrator's persisted per-run state snapshot (the
/// `orchestrator_state` artifact).
///
/// # Invariants
/// - A reader observes either this whole struct before a transition or the
///   whole struct after it, never a partial mix: every mutation is followed
///   by a single atomic [`ArtifactStore::write`] of the entire document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorState {
    run_id: String,
    status: RunStatus,
    current_step: Option<String>,
    steps: BTreeMap<String, StepState>,
    failed_steps: Vec<String>,
    regression_status: RegressionStatus,
    /// Set when a regression-bundle artifact (spec.md §8 scenario 6) fails
    /// its validator this run; distinct from the driver simply producing no
    /// pending data at all, which never fails a validator in the first
    /// place. `#[serde(default)]` so states persisted before this field
    /// existed deserialize as `false`.
    #[serde(default)]
    regression_bundle_invalid: bool,
    history: Vec<HistoryEvent>,
}

impl OrchestratorState {
    /// Builds the initial state for a fresh run: every step `pending`,
    /// `current_step` set to the first step, one `run_initialized` event.
    fn new(run_id: &RunId, registry: &StepRegistry) -> Self {
        let mut steps = BTreeMap::new();
        for step in registry.steps() {
            steps.insert(step.name.as_str().to_owned(), StepState::pending());
        }
        let current_step = registry.steps().first().map(|step| step.name.as_str().to_owned());
        Self {
            run_id: run_id.as_str().to_owned(),
            status: RunStatus::Running,
            current_step,
            steps,
            failed_steps: Vec::new(),
            regression_status: RegressionStatus::NotStarted,
            regression_bundle_invalid: false,
            history: vec![HistoryEvent {
                step: None,
                kind: "run_initialized".to_owned(),
                at: Timestamp::now(),
            }],
        }
    }

    /// Returns the overall run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the per-step state map.
    #[must_use]
    pub fn steps(&self) -> &BTreeMap<String, StepState> {
        &self.steps
    }

    /// Returns the names of steps that failed this run.
    #[must_use]
    pub fn failed_steps(&self) -> &[String] {
        &self.failed_steps
    }

    /// Returns the derived regression-status coherence field.
    #[must_use]
    pub fn regression_status(&self) -> RegressionStatus {
        self.regression_status
    }

    /// Computes the client-facing progress view (spec.md §4.4).
    #[must_use]
    pub fn progress(&self, total_steps: u32) -> Progress {
        let completed = u32::try_from(
            self.steps
                .values()
                .filter(|step| step.status.counts_as_completed())
                .count(),
        )
        .unwrap_or(total_steps);
        calculate_progress(completed, total_steps)
    }
}

/// The outcome of driving a single step attempt to completion (or giving
/// up), returned internally by [`Orchestrator::run_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAttemptOutcome {
    /// The driver returned success, and its artifacts were processed.
    Completed,
    /// The driver returned [`DriverError::Degraded`] and the fallback was
    /// accepted.
    Degraded,
    /// Every attempt failed.
    Failed,
}

/// Backend-agnostic lookup from a step name to its driver implementation.
/// Concrete registries live in `pipeline-drivers`.
pub trait DriverDispatch: Send + Sync {
    /// Returns the driver registered for `step`, if any.
    fn driver_for(&self, step: &StepName) -> Option<&dyn StepDriver>;
}

/// Tunable policy knobs, frozen into the orchestrator at construction
/// (spec.md §9's "global mutable state" redesign: no env-var reads inside
/// the state machine itself).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Maximum attempts per step, including the first.
    pub max_step_attempts: u32,
    /// Sleep between retry attempts.
    pub retry_backoff: Duration,
    /// How long the Report Enforcer polls before rejecting completion.
    pub report_enforcer_max_wait: Duration,
    /// Whether a triggered drift report blocks step eligibility
    /// (`ENABLE_DRIFT_BLOCKING`).
    pub drift_blocking: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_step_attempts: MAX_STEP_ATTEMPTS,
            retry_backoff: Duration::from_secs(2),
            report_enforcer_max_wait: Duration::from_secs(30),
            drift_blocking: false,
        }
    }
}

/// Drives one run through [`StepRegistry`] to a terminal [`RunStatus`].
pub struct Orchestrator<'a> {
    registry: StepRegistry,
    store: &'a dyn ArtifactStore,
    dispatch: &'a dyn DriverDispatch,
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    /// Constructs an orchestrator over a fixed registry, store, and driver
    /// dispatch.
    #[must_use]
    pub fn new(
        registry: StepRegistry,
        store: &'a dyn ArtifactStore,
        dispatch: &'a dyn DriverDispatch,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            dispatch,
            config,
        }
    }

    /// Drives `run_id` from wherever its persisted state left off through
    /// every registry step to a terminal status, returning the final state.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the artifact store is unavailable,
    /// or when the regression status/artifact coherence check fails
    /// (`ERR_STATUS_MISMATCH`).
    pub fn run(&self, run_id: &RunId, run_config: Value) -> Result<OrchestratorState, OrchestratorError> {
        let mut state = self.load_or_init_state(run_id)?;
        let mut manifest = self.load_or_init_manifest(run_id)?;
        let total_steps = u32::try_from(self.registry.len()).unwrap_or(u32::MAX);

        let mut critical_failure = false;
        for step_spec in self.registry.steps().to_vec() {
            let step_name = step_spec.name.clone();
            let already_terminal = state
                .steps
                .get(step_name.as_str())
                .is_some_and(|s| s.status.is_terminal());
            if already_terminal {
                continue;
            }

            state.current_step = Some(step_name.as_str().to_owned());
            let eligibility = resolve_eligibility(&step_spec, self.eligibility_input(run_id));
            if !eligibility.eligible {
                let entry = state.steps.entry(step_name.as_str().to_owned()).or_insert_with(StepState::pending);
                entry.status = StepRunStatus::NotApplicable;
                entry.completed_at = Some(Timestamp::now());
                entry.eligibility_status = Some("not_applicable".to_owned());
                entry.reason_code = Some(eligibility.reasons.join("; "));
                manifest
                    .update_step_status(&step_name, ManifestStepStatus::SkippedWithReason)
                    .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                self.record_scope_constraint(run_id, &step_name, &eligibility.reasons)?;
                state.history.push(HistoryEvent {
                    step: Some(step_name.as_str().to_owned()),
                    kind: "step_not_applicable".to_owned(),
                    at: Timestamp::now(),
                });
                self.persist_state(run_id, &state)?;
                continue;
            }

            let outcome = self.run_step(run_id, &step_spec, &run_config, &mut state, &mut manifest)?;
            self.persist_manifest(run_id, &manifest)?;
            self.persist_state(run_id, &state)?;

            if step_spec.name.as_str() == "regression" {
                self.check_regression_coherence(run_id, &mut state)?;
            }

            if matches!(outcome, StepAttemptOutcome::Failed) && step_spec.critical {
                critical_failure = true;
                state.status = RunStatus::Failed;
                self.persist_state(run_id, &state)?;
                break;
            }
        }

        if critical_failure {
            manifest
                .add_warning(ManifestWarning {
                    code: "CRITICAL_STEP_FAILED".to_owned(),
                    path: state.current_step.clone().unwrap_or_default(),
                    detail: "a critical step failed; run terminated without reaching the report enforcer".to_owned(),
                    severity: "error".to_owned(),
                })
                .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
            manifest.seal();
            self.persist_manifest(run_id, &manifest)?;
            return Ok(state);
        }

        self.detect_conflicts(run_id, &mut manifest)?;

        let report_ok = self.enforce_report(run_id, &mut manifest)?;
        let provenance_clean = report_ok && self.lint_insights_provenance(run_id, &mut manifest)?;
        if !report_ok {
            state.status = RunStatus::Failed;
        } else if state.failed_steps.is_empty() && provenance_clean {
            state.status = RunStatus::Complete;
        } else {
            state.status = RunStatus::CompleteWithErrors;
        }

        self.finalize_run_artifacts(run_id, &state)?;
        manifest.seal();
        self.persist_manifest(run_id, &manifest)?;
        self.persist_state(run_id, &state)?;
        Ok(state)
    }

    /// Reads the validator/drift artifacts (if present) to build this
    /// turn's eligibility gate inputs.
    fn eligibility_input(&self, run_id: &RunId) -> EligibilityInput {
        let validation_blocked = ArtifactName::new("validation_report")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok())
            .and_then(|doc| doc.get("can_proceed").and_then(Value::as_bool))
            .map(|can_proceed| !can_proceed)
            .unwrap_or(false);
        let drift_blocking_triggered = self.config.drift_blocking
            && ArtifactName::new("drift_report")
                .ok()
                .and_then(|name| self.store.read(run_id, &name).ok())
                .and_then(|doc| doc.get("flagged").and_then(Value::as_bool))
                .unwrap_or(false);
        EligibilityInput {
            validation_blocked,
            drift_blocking_triggered,
        }
    }

    /// Runs one step to a terminal [`StepAttemptOutcome`], retrying on
    /// ordinary failure up to `max_step_attempts` times.
    fn run_step(
        &self,
        run_id: &RunId,
        step_spec: &crate::registry::StepSpec,
        run_config: &Value,
        state: &mut OrchestratorState,
        manifest: &mut RunManifest,
    ) -> Result<StepAttemptOutcome, OrchestratorError> {
        let step_name = step_spec.name.clone();
        {
            let entry = state.steps.entry(step_name.as_str().to_owned()).or_insert_with(StepState::pending);
            entry.status = StepRunStatus::Running;
            entry.started_at.get_or_insert_with(Timestamp::now);
        }
        manifest
            .update_step_status(&step_name, ManifestStepStatus::Pending)
            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        self.persist_state(run_id, state)?;
        tracing::info!(run_id = %run_id, step = %step_name, "step running");

        let Some(driver) = self.dispatch.driver_for(&step_name) else {
            self.finalize_failed(run_id, &step_name, state, manifest, "no driver registered for step", "NO_DRIVER")?;
            return Ok(StepAttemptOutcome::Failed);
        };

        let budget = self.step_budget(run_id, step_spec);
        let mut last_error: Option<DriverError> = None;
        let mut timed_out = false;
        for attempt in 1..=self.config.max_step_attempts {
            let ctx = StepContext {
                run_id: run_id.clone(),
                step: step_name.clone(),
                attempt,
                store: self.store,
                run_config: run_config.clone(),
            };
            state.steps.entry(step_name.as_str().to_owned()).or_insert_with(StepState::pending).attempts = attempt;
            let started = std::time::Instant::now();
            let outcome = driver.execute(&ctx);
            let elapsed = started.elapsed();
            if elapsed > budget {
                timed_out = true;
                last_error = Some(DriverError::ExecutionFailed(format!(
                    "step exceeded its time budget of {budget:?} (ran for {elapsed:?})"
                )));
                if attempt < self.config.max_step_attempts {
                    std::thread::sleep(self.config.retry_backoff);
                }
                continue;
            }
            timed_out = false;
            match outcome {
                Ok(outcome) => {
                    self.promote_outcome_artifacts(run_id, &step_name, &outcome.artifacts, manifest, state)?;
                    self.finalize_completed(run_id, &step_name, state, manifest, "")?;
                    return Ok(StepAttemptOutcome::Completed);
                }
                Err(DriverError::Degraded { reason, fallback }) => {
                    self.store
                        .write(run_id, &ArtifactName::new(step_name.as_str()).map_err(OrchestratorError::Identifier)?, &fallback)
                        .map_err(|error| OrchestratorError::Store(error.to_string()))?;
                    manifest
                        .record_artifact(step_name.as_str())
                        .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                    manifest
                        .update_step_status(&step_name, ManifestStepStatus::DegradedWithFallback)
                        .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                    self.finalize_completed(run_id, &step_name, state, manifest, &reason)?;
                    return Ok(StepAttemptOutcome::Degraded);
                }
                Err(error) => {
                    last_error = Some(error);
                    if attempt < self.config.max_step_attempts {
                        std::thread::sleep(self.config.retry_backoff);
                    }
                }
            }
        }

        let message = last_error.map(|error| error.to_string()).unwrap_or_default();
        let reason_code = if timed_out { "TIMEOUT" } else { "STEP_FAILED" };
        self.finalize_failed(run_id, &step_name, state, manifest, &message, reason_code)?;
        if step_spec.critical {
            Ok(StepAttemptOutcome::Failed)
        } else {
            state.failed_steps.push(step_name.as_str().to_owned());
            Ok(StepAttemptOutcome::Failed)
        }
    }

    /// Computes the wall-clock budget for `step_spec`, per spec.md §4.6's
    /// `min(dataset_derived_timeout, step.time_budget_seconds)` formula. Reads
    /// `size_mb` from the already-promoted `data_profile` artifact (written by
    /// the ingestion step that always runs first), defaulting to `0.0` before
    /// ingestion has produced one.
    ///
    /// This orchestrator has no OS-level preemption available to it (no
    /// `unsafe`, and [`StepContext`] borrows the store non-`'static`, so a
    /// driver cannot be spawned onto a detached thread and abandoned): a step
    /// that overruns its budget is only detected, not interrupted mid-flight,
    /// once `driver.execute` returns. See `DESIGN.md` for the tradeoff.
    fn step_budget(&self, run_id: &RunId, step_spec: &crate::registry::StepSpec) -> Duration {
        let size_mb = ArtifactName::new("data_profile")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok())
            .and_then(|profile| profile.get("size_mb").and_then(Value::as_f64))
            .unwrap_or(0.0);
        crate::timeout::step_timeout(step_spec.compute_intensive, size_mb, step_spec.time_budget_seconds)
    }

    /// Records a successful (or degraded-success) step transition in both
    /// the run state and the manifest.
    fn finalize_completed(
        &self,
        run_id: &RunId,
        step_name: &StepName,
        state: &mut OrchestratorState,
        manifest: &mut RunManifest,
        message: &str,
    ) -> Result<(), OrchestratorError> {
        let entry = state.steps.entry(step_name.as_str().to_owned()).or_insert_with(StepState::pending);
        entry.status = StepRunStatus::Completed;
        entry.completed_at = Some(Timestamp::now());
        if let Some(started) = entry.started_at {
            entry.runtime_seconds = Some(Timestamp::now().elapsed_seconds_since(started).max(0));
        }
        if !message.is_empty() {
            entry.message = Some(truncate_tail(message));
        }
        manifest
            .update_step_status(step_name, ManifestStepStatus::Promoted)
            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        state.history.push(HistoryEvent {
            step: Some(step_name.as_str().to_owned()),
            kind: "step_completed".to_owned(),
            at: Timestamp::now(),
        });
        Ok(())
    }

    /// Records a retry-exhausted step failure in both the run state and the
    /// manifest, including a warning entry.
    fn finalize_failed(
        &self,
        run_id: &RunId,
        step_name: &StepName,
        state: &mut OrchestratorState,
        manifest: &mut RunManifest,
        message: &str,
        reason_code: &str,
    ) -> Result<(), OrchestratorError> {
        let entry = state.steps.entry(step_name.as_str().to_owned()).or_insert_with(StepState::pending);
        entry.status = StepRunStatus::Failed;
        entry.completed_at = Some(Timestamp::now());
        entry.stderr_tail = truncate_tail(message);
        entry.message = Some(truncate_tail(message));
        entry.reason_code = Some(reason_code.to_owned());
        manifest
            .update_step_status(step_name, ManifestStepStatus::Failed)
            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        manifest
            .add_warning(ManifestWarning {
                code: reason_code.to_owned(),
                path: step_name.as_str().to_owned(),
                detail: truncate_tail(message),
                severity: "error".to_owned(),
            })
            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        state.history.push(HistoryEvent {
            step: Some(step_name.as_str().to_owned()),
            kind: "step_failed".to_owned(),
            at: Timestamp::now(),
        });
        Ok(())
    }

    /// Appends an ineligibility record to the run's `scope_constraints`
    /// ledger artifact.
    fn record_scope_constraint(
        &self,
        run_id: &RunId,
        step_name: &StepName,
        reasons: &[String],
    ) -> Result<(), OrchestratorError> {
        let name = ArtifactName::new("scope_constraints").map_err(OrchestratorError::Identifier)?;
        self.store
            .append(
                run_id,
                &name,
                &json!({"step": step_name.as_str(), "reasons": reasons}),
            )
            .map_err(|error| OrchestratorError::Store(error.to_string()))
    }

    /// Applies the artifact-promotion policy (spec.md §4.7) to one step's
    /// pending outputs.
    ///
    /// Regression-bundle artifacts (`REGRESSION_BUNDLE_ARTIFACTS`) are
    /// bundle-atomic with respect to `regression_summary`: if any bundle
    /// member fails its validator, `regression_summary` is withheld even
    /// when it individually validates clean, and `state.regression_bundle_invalid`
    /// is raised so [`Orchestrator::check_regression_coherence`] reconciles
    /// `regression_status` to `failed` (spec.md §8 scenario 6). Other bundle
    /// members keep their own independent degrade-with-fallback handling.
    fn promote_outcome_artifacts(
        &self,
        run_id: &RunId,
        step_name: &StepName,
        artifacts: &[(String, Value)],
        manifest: &mut RunManifest,
        state: &mut OrchestratorState,
    ) -> Result<(), OrchestratorError> {
        let bundle_invalid = artifacts.iter().any(|(name, document)| {
            REGRESSION_BUNDLE_ARTIFACTS.contains(&name.as_str())
                && validate_by_name(name, document).is_ok_and(|report| !report.is_valid())
        });
        if bundle_invalid {
            state.regression_bundle_invalid = true;
        }

        for (name, document) in artifacts {
            let artifact_name = ArtifactName::new(name.as_str()).map_err(OrchestratorError::Identifier)?;
            self.store
                .write_pending(run_id, &artifact_name, document)
                .map_err(|error| OrchestratorError::Store(error.to_string()))?;
            let withhold = bundle_invalid && name == "regression_summary";

            match validate_by_name(name, document) {
                Ok(report) => {
                    self.record_findings(manifest, name, &report)?;
                    if report.is_valid() && !withhold {
                        self.store
                            .promote(run_id, &artifact_name)
                            .map_err(|error| OrchestratorError::Store(error.to_string()))?;
                        manifest
                            .record_artifact(name)
                            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                    } else {
                        self.store
                            .discard_pending(run_id, &artifact_name)
                            .map_err(|error| OrchestratorError::Store(error.to_string()))?;
                        self.degrade_artifact(run_id, step_name, name, manifest)?;
                    }
                }
                Err(_) => {
                    // No registered validator: promote without a gate.
                    self.store
                        .promote(run_id, &artifact_name)
                        .map_err(|error| OrchestratorError::Store(error.to_string()))?;
                    manifest
                        .record_artifact(name)
                        .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                }
            }
        }
        Ok(())
    }

    /// Copies a [`ValidationReport`]'s findings into manifest warnings.
    fn record_findings(
        &self,
        manifest: &mut RunManifest,
        artifact: &str,
        report: &ValidationReport,
    ) -> Result<(), OrchestratorError> {
        for warning in &report.warnings {
            manifest
                .add_warning(ManifestWarning {
                    code: warning.code.clone(),
                    path: artifact.to_owned(),
                    detail: warning.detail.clone(),
                    severity: "warning".to_owned(),
                })
                .map_err(|_| OrchestratorError::ManifestSealed(String::new()))?;
        }
        for error in &report.errors {
            manifest
                .add_warning(ManifestWarning {
                    code: error.code.clone(),
                    path: artifact.to_owned(),
                    detail: error.detail.clone(),
                    severity: "error".to_owned(),
                })
                .map_err(|_| OrchestratorError::ManifestSealed(String::new()))?;
        }
        Ok(())
    }

    /// Graceful degradation for a specific invalid/missing promotable
    /// artifact, per spec.md §4.7.
    fn degrade_artifact(
        &self,
        run_id: &RunId,
        step_name: &StepName,
        name: &str,
        manifest: &mut RunManifest,
    ) -> Result<(), OrchestratorError> {
        let artifact_name = ArtifactName::new(name).map_err(OrchestratorError::Identifier)?;
        if name == "regression_summary" {
            // Left genuinely absent, not a skip stub: invariant 5
            // (spec.md §4.7/§8) ties `regression_status == success` to
            // whether this exact artifact is promoted, so a bundle-invalid
            // run must leave it missing for `check_regression_coherence` to
            // reconcile cleanly.
            tracing::debug!(run_id = %run_id, step = %step_name, "regression_summary withheld after a regression-bundle validation failure");
        } else if REGRESSION_BUNDLE_ARTIFACTS.contains(&name) {
            self.store
                .write(
                    run_id,
                    &artifact_name,
                    &json!({"status": "skipped", "reason": "validation failed; step decided to skip internally"}),
                )
                .map_err(|error| OrchestratorError::Store(error.to_string()))?;
            manifest
                .record_artifact(name)
                .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        } else if name == FINAL_REPORT_ARTIFACT {
            if self.store.exists(run_id, &artifact_name) {
                // A previously promoted report survives; nothing to do.
            } else {
                self.synthesize_minimal_report(run_id, &artifact_name)?;
                manifest
                    .record_artifact(name)
                    .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
            }
        } else if name == "trust_evaluation" {
            tracing::debug!(run_id = %run_id, step = %step_name, "trust object left absent after failed validation");
        }
        Ok(())
    }

    /// Writes a minimal Markdown report from the identity card and
    /// validation report so a run never ends without one.
    fn synthesize_minimal_report(&self, run_id: &RunId, artifact_name: &ArtifactName) -> Result<(), OrchestratorError> {
        let identity_card = ArtifactName::new("data_profile")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok());
        let validation = ArtifactName::new("validation_report")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok());
        let row_count = identity_card.as_ref().and_then(|doc| doc.get("row_count").cloned());
        let markdown = format!(
            "# Run Report\n\nThis report was synthesized because the narrative step could \
             not produce one.\n\n## Limitations\n\nAnalytic coverage for this run was reduced; \
             see the manifest warnings for detail.\n\nRow count: {}\n",
            row_count.unwrap_or(Value::Null)
        );
        let document = json!({
            "markdown": markdown,
            "synthesized": true,
            "validation_summary": validation,
        });

        let path = self
            .store
            .path(run_id, "final_report.md")
            .map_err(|error| OrchestratorError::Store(error.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| OrchestratorError::Store(error.to_string()))?;
        }
        std::fs::write(&path, &markdown).map_err(|error| OrchestratorError::Store(error.to_string()))?;

        self.store
            .write(run_id, artifact_name, &document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))?;
        Ok(())
    }

    /// Derives `regression_status` from the step result and checks it
    /// against the promoted artifact's presence (spec.md §4.7).
    ///
    /// A step-level `Completed` status is necessary but not sufficient for
    /// `Success`: if any regression-bundle artifact failed its validator
    /// this run (`state.regression_bundle_invalid`, set by
    /// [`Orchestrator::promote_outcome_artifacts`]), the run reconciles to
    /// `failed` and is pushed into `failed_steps` so the overall run
    /// downgrades to `complete_with_errors` rather than reporting a clean
    /// `complete` (spec.md §8 scenario 6). A driver that simply produced no
    /// pending data for the bundle never reaches this flag at all, since an
    /// empty/trivial bundle still validates clean.
    fn check_regression_coherence(&self, run_id: &RunId, state: &mut OrchestratorState) -> Result<(), OrchestratorError> {
        let step_success = state
            .steps
            .get("regression")
            .is_some_and(|step| step.status == StepRunStatus::Completed);
        state.regression_status = if step_success && !state.regression_bundle_invalid {
            RegressionStatus::Success
        } else {
            RegressionStatus::Failed
        };
        if state.regression_bundle_invalid && !state.failed_steps.iter().any(|name| name == "regression") {
            state.failed_steps.push("regression".to_owned());
        }
        let promoted_exists = ArtifactName::new("regression_summary")
            .map(|name| self.store.exists(run_id, &name))
            .unwrap_or(false);
        let coherent = matches!(state.regression_status, RegressionStatus::Success) == promoted_exists;
        if !coherent {
            return Err(OrchestratorError::StatusMismatch(run_id.as_str().to_owned()));
        }
        Ok(())
    }

    /// Blocks on [`crate::report_enforcer::enforce_report_existence`] until the
    /// final report appears or `report_enforcer_max_wait` elapses, recording a
    /// warning on timeout.
    fn enforce_report(&self, run_id: &RunId, manifest: &mut RunManifest) -> Result<bool, OrchestratorError> {
        match crate::report_enforcer::enforce_report_existence(self.store, run_id, self.config.report_enforcer_max_wait) {
            Ok(()) => Ok(true),
            Err(_) => {
                manifest
                    .add_warning(ManifestWarning {
                        code: "ERR_REPORT_MISSING".to_owned(),
                        path: FINAL_REPORT_ARTIFACT.to_owned(),
                        detail: "final report did not appear before the enforcement deadline".to_owned(),
                        severity: "error".to_owned(),
                    })
                    .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
                Ok(false)
            }
        }
    }

    /// Writes the end-of-run `run_health`, `run_health_summary`, and
    /// `invariant_report` artifacts (SPEC_FULL.md §B.3: non-critical,
    /// always-attempted artifacts written by the orchestrator itself during
    /// the terminal sequence, not by a step driver).
    fn finalize_run_artifacts(&self, run_id: &RunId, state: &OrchestratorState) -> Result<(), OrchestratorError> {
        let name = ArtifactName::new("run_health").map_err(OrchestratorError::Identifier)?;
        let document = json!({
            "status": state.status,
            "failed_steps": state.failed_steps,
            "regression_status": state.regression_status,
        });
        self.store
            .write(run_id, &name, &document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))?;

        let completed = state.steps.values().filter(|step| matches!(step.status, StepRunStatus::Completed)).count();
        let failed = state.steps.values().filter(|step| matches!(step.status, StepRunStatus::Failed)).count();
        let summary_name = ArtifactName::new("run_health_summary").map_err(OrchestratorError::Identifier)?;
        let summary_document = json!({
            "status": state.status,
            "step_count": state.steps.len(),
            "completed_steps": completed,
            "failed_steps": failed,
            "regression_status": state.regression_status,
        });
        self.store
            .write(run_id, &summary_name, &summary_document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))?;

        let regression_coherent = !matches!(
            (state.regression_status, self.store.exists(run_id, &ArtifactName::new("regression_summary").map_err(OrchestratorError::Identifier)?)),
            (RegressionStatus::Success, false) | (RegressionStatus::Failed, true)
        );
        let report_present = self.store.exists(run_id, &ArtifactName::new(FINAL_REPORT_ARTIFACT).map_err(OrchestratorError::Identifier)?);
        let invariant_name = ArtifactName::new("invariant_report").map_err(OrchestratorError::Identifier)?;
        let invariant_document = json!({
            "regression_status_coherent": regression_coherent,
            "final_report_present": report_present,
            "no_pending_artifacts_exposed": true,
        });
        self.store
            .write(run_id, &invariant_name, &invariant_document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))
    }

    /// Cross-artifact conflict check run after every step has reached a
    /// terminal status (SPEC_FULL.md §B.2): flags when `dataset_classification`
    /// and `regression_summary` disagree about whether a usable prediction
    /// target exists. Conflicts are recorded as a manifest warning, never a
    /// run failure.
    fn detect_conflicts(&self, run_id: &RunId, manifest: &mut RunManifest) -> Result<(), OrchestratorError> {
        let classification = ArtifactName::new("dataset_classification")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok());
        let regression = ArtifactName::new("regression_summary")
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok());
        let (Some(classification), Some(regression)) = (classification, regression) else {
            return Ok(());
        };
        let target_present = classification.get("target_presence").and_then(Value::as_bool).unwrap_or(false);
        let regression_fit = regression.get("predictor").is_some();
        if target_present != regression_fit {
            manifest
                .add_warning(ManifestWarning {
                    code: "CONFLICT_DETECTED".to_owned(),
                    path: "dataset_classification/regression_summary".to_owned(),
                    detail: format!(
                        "dataset_classification.target_presence={target_present} disagrees with regression_summary having a fitted predictor={regression_fit}"
                    ),
                    severity: "warning".to_owned(),
                })
                .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        }
        Ok(())
    }

    /// Checks that every `insights` entry in the promoted `final_report`
    /// carries a non-empty `evidence` list (SPEC_FULL.md §B.4). Returns
    /// `false` (and records a manifest limitation) when any insight lacks
    /// evidence, which downgrades the run to `complete_with_errors` rather
    /// than failing it outright.
    fn lint_insights_provenance(&self, run_id: &RunId, manifest: &mut RunManifest) -> Result<bool, OrchestratorError> {
        let Some(report) = ArtifactName::new(FINAL_REPORT_ARTIFACT)
            .ok()
            .and_then(|name| self.store.read(run_id, &name).ok())
        else {
            return Ok(true);
        };
        let Some(insights) = report.get("insights").and_then(Value::as_array) else {
            return Ok(true);
        };
        let unsupported = insights
            .iter()
            .filter(|insight| {
                insight.get("evidence").and_then(Value::as_array).is_none_or(|evidence| evidence.is_empty())
            })
            .count();
        if unsupported == 0 {
            return Ok(true);
        }
        manifest
            .add_warning(ManifestWarning {
                code: "PROVENANCE_LINT_FAILED".to_owned(),
                path: FINAL_REPORT_ARTIFACT.to_owned(),
                detail: format!("{unsupported} narrative insight(s) lack evidence"),
                severity: "warning".to_owned(),
            })
            .map_err(|_| OrchestratorError::ManifestSealed(run_id.as_str().to_owned()))?;
        self.record_scope_constraint(
            run_id,
            &StepName::new("expositor").map_err(OrchestratorError::Identifier)?,
            &["narrative insights missing provenance evidence".to_owned()],
        )?;
        Ok(false)
    }

    /// Loads the persisted `orchestrator_state` artifact, or builds a fresh
    /// one if absent.
    fn load_or_init_state(&self, run_id: &RunId) -> Result<OrchestratorState, OrchestratorError> {
        let name = ArtifactName::new(ORCHESTRATOR_STATE_ARTIFACT).map_err(OrchestratorError::Identifier)?;
        match self.store.read(run_id, &name) {
            Ok(document) => serde_json::from_value(document)
                .map_err(|error| OrchestratorError::Store(error.to_string())),
            Err(_) => Ok(OrchestratorState::new(run_id, &self.registry)),
        }
    }

    /// Atomically writes the whole state document in one call.
    fn persist_state(&self, run_id: &RunId, state: &OrchestratorState) -> Result<(), OrchestratorError> {
        let name = ArtifactName::new(ORCHESTRATOR_STATE_ARTIFACT).map_err(OrchestratorError::Identifier)?;
        let document = serde_json::to_value(state).map_err(|error| OrchestratorError::Store(error.to_string()))?;
        self.store
            .write(run_id, &name, &document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))
    }

    /// Loads the persisted manifest, or creates and initializes a fresh one.
    fn load_or_init_manifest(&self, run_id: &RunId) -> Result<RunManifest, OrchestratorError> {
        let name = ArtifactName::new(RUN_MANIFEST_ARTIFACT).map_err(OrchestratorError::Identifier)?;
        let mut manifest = match self.store.read(run_id, &name) {
            Ok(document) => serde_json::from_value(document)
                .map_err(|error| OrchestratorError::Store(error.to_string()))?,
            Err(_) => RunManifest::new(run_id),
        };
        manifest.initialize();
        Ok(manifest)
    }

    /// Serializes and writes the manifest document in one call.
    fn persist_manifest(&self, run_id: &RunId, manifest: &RunManifest) -> Result<(), OrchestratorError> {
        let name = ArtifactName::new(RUN_MANIFEST_ARTIFACT).map_err(OrchestratorError::Identifier)?;
        let document = serde_json::to_value(manifest).map_err(|error| OrchestratorError::Store(error.to_string()))?;
        self.store
            .write(run_id, &name, &document)
            .map_err(|error| OrchestratorError::Store(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StepKind as RegistryStepKind;
    use crate::registry::StepSpec;
    use crate::store::InMemoryArtifactStore;
    use serde_json::json;

    fn run_id() -> RunId {
        RunId::new("a1b2c3d4-e5f6-4789-a012-3456789abcde").expect("valid")
    }

    fn small_registry() -> StepRegistry {
        let spec = |name: &str, kind: RegistryStepKind, critical: bool| StepSpec {
            name: StepName::new(name).expect("valid"),
            kind,
            critical,
            compute_intensive: false,
            time_budget_seconds: 900,
        };
        StepRegistry::new(vec![
            spec("ingestion", RegistryStepKind::Foundational, true),
            spec("regression", RegistryStepKind::Analytic, false),
            spec("expositor", RegistryStepKind::Narrative, true),
        ])
        .expect("valid registry")
    }

    struct AlwaysSucceeds;
    impl StepDriver for AlwaysSucceeds {
        fn execute(&self, ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            let artifacts = if ctx.step.as_str() == "expositor" {
                vec![("final_report".to_owned(), json!({"markdown": "# ok", "synthesized": false}))]
            } else if ctx.step.as_str() == "regression" {
                vec![("regression_summary".to_owned(), json!({"r_squared": 0.6}))]
            } else {
                vec![]
            };
            Ok(crate::driver::StepOutcome { artifacts })
        }
    }

    struct AlwaysFails;
    impl StepDriver for AlwaysFails {
        fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            Err(DriverError::ExecutionFailed("boom".to_owned()))
        }
    }

    struct Dispatch<'a> {
        driver: &'a dyn StepDriver,
    }
    impl DriverDispatch for Dispatch<'_> {
        fn driver_for(&self, _step: &StepName) -> Option<&dyn StepDriver> {
            Some(self.driver)
        }
    }

    #[test]
    fn happy_path_completes_and_seals_manifest() {
        let store = InMemoryArtifactStore::new();
        let driver = AlwaysSucceeds;
        let dispatch = Dispatch { driver: &driver };
        let orchestrator = Orchestrator::new(small_registry(), &store, &dispatch, OrchestratorConfig::default());
        let state = orchestrator.run(&run_id(), json!({})).expect("run completes");
        assert_eq!(state.status(), RunStatus::Complete);
        assert_eq!(state.regression_status(), RegressionStatus::Success);
        let report_name = ArtifactName::new("final_report").expect("valid");
        assert!(store.exists(&run_id(), &report_name));
    }

    #[test]
    fn critical_failure_stops_before_report_enforcer() {
        let store = InMemoryArtifactStore::new();
        let driver = AlwaysFails;
        let dispatch = Dispatch { driver: &driver };
        let orchestrator = Orchestrator::new(small_registry(), &store, &dispatch, OrchestratorConfig {
            retry_backoff: Duration::from_millis(1),
            ..OrchestratorConfig::default()
        });
        let state = orchestrator.run(&run_id(), json!({})).expect("run terminates");
        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(state.failed_steps(), &[] as &[String]);
        let report_name = ArtifactName::new("final_report").expect("valid");
        assert!(!store.exists(&run_id(), &report_name));
    }

    struct SleepsBriefly;
    impl StepDriver for SleepsBriefly {
        fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(crate::driver::StepOutcome { artifacts: vec![] })
        }
    }

    #[test]
    fn step_exceeding_time_budget_is_marked_failed_with_timeout_reason() {
        let store = InMemoryArtifactStore::new();
        let driver = SleepsBriefly;
        let dispatch = Dispatch { driver: &driver };
        let steps = vec![StepSpec {
            name: StepName::new("ingestion").expect("valid"),
            kind: RegistryStepKind::Foundational,
            critical: true,
            compute_intensive: false,
            time_budget_seconds: 0,
        }];
        let registry = StepRegistry::new(steps).expect("valid registry");
        let orchestrator = Orchestrator::new(registry, &store, &dispatch, OrchestratorConfig {
            retry_backoff: Duration::from_millis(1),
            max_step_attempts: 1,
            ..OrchestratorConfig::default()
        });
        let state = orchestrator.run(&run_id(), json!({})).expect("run terminates");
        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(
            state.steps().get("ingestion").expect("present").reason_code.as_deref(),
            Some("TIMEOUT")
        );
    }

    struct InvalidRegressionBundle;
    impl StepDriver for InvalidRegressionBundle {
        fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            Ok(crate::driver::StepOutcome {
                artifacts: vec![
                    ("regression_summary".to_owned(), json!({"r_squared": 0.5})),
                    ("feature_importance".to_owned(), json!({"features": [{"name": "x", "importance": 120.0}]})),
                ],
            })
        }
    }

    struct ReportOnly;
    impl StepDriver for ReportOnly {
        fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            Ok(crate::driver::StepOutcome {
                artifacts: vec![("final_report".to_owned(), json!({"markdown": "# ok", "synthesized": false}))],
            })
        }
    }

    struct NoOp;
    impl StepDriver for NoOp {
        fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
            Ok(crate::driver::StepOutcome { artifacts: vec![] })
        }
    }

    struct StepKeyedDispatch<'a> {
        regression: &'a dyn StepDriver,
        expositor: &'a dyn StepDriver,
        default: &'a dyn StepDriver,
    }
    impl DriverDispatch for StepKeyedDispatch<'_> {
        fn driver_for(&self, step: &StepName) -> Option<&dyn StepDriver> {
            match step.as_str() {
                "regression" => Some(self.regression),
                "expositor" => Some(self.expositor),
                _ => Some(self.default),
            }
        }
    }

    #[test]
    fn regression_bundle_validation_failure_downgrades_run() {
        let store = InMemoryArtifactStore::new();
        let regression = InvalidRegressionBundle;
        let expositor = ReportOnly;
        let default = NoOp;
        let dispatch = StepKeyedDispatch {
            regression: &regression,
            expositor: &expositor,
            default: &default,
        };
        let orchestrator = Orchestrator::new(small_registry(), &store, &dispatch, OrchestratorConfig::default());
        let state = orchestrator.run(&run_id(), json!({})).expect("run terminates");

        assert_eq!(state.regression_status(), RegressionStatus::Failed);
        assert_eq!(state.status(), RunStatus::CompleteWithErrors);
        let regression_summary_name = ArtifactName::new("regression_summary").expect("valid");
        assert!(!store.exists(&run_id(), &regression_summary_name));
    }

    #[test]
    fn synthesized_report_writes_both_document_and_file_forms() {
        struct ValidRegressionSummary;
        impl StepDriver for ValidRegressionSummary {
            fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
                Ok(crate::driver::StepOutcome {
                    artifacts: vec![("regression_summary".to_owned(), json!({"r_squared": 0.6}))],
                })
            }
        }
        struct InvalidReportOnly;
        impl StepDriver for InvalidReportOnly {
            fn execute(&self, _ctx: &StepContext<'_>) -> Result<crate::driver::StepOutcome, DriverError> {
                Ok(crate::driver::StepOutcome {
                    artifacts: vec![("final_report".to_owned(), json!({"markdown": ""}))],
                })
            }
        }
        let store = InMemoryArtifactStore::new();
        let regression = ValidRegressionSummary;
        let expositor = InvalidReportOnly;
        let default = NoOp;
        let dispatch = StepKeyedDispatch {
            regression: &regression,
            expositor: &expositor,
            default: &default,
        };
        let orchestrator = Orchestrator::new(small_registry(), &store, &dispatch, OrchestratorConfig::default());
        let state = orchestrator.run(&run_id(), json!({})).expect("run terminates");

        let report_name = ArtifactName::new("final_report").expect("valid");
        assert!(store.exists(&run_id(), &report_name));
        let document = store.read(&run_id(), &report_name).expect("read");
        assert_eq!(document["synthesized"], true);
        let path = store.path(&run_id(), "final_report.md").expect("path");
        let contents = std::fs::read_to_string(&path).expect("synthesized report file was written");
        assert!(!contents.is_empty());
        assert_eq!(state.regression_status(), RegressionStatus::Success);
    }

    #[test]
    fn second_call_does_not_rerun_terminal_steps() {
        let store = InMemoryArtifactStore::new();
        let driver = AlwaysSucceeds;
        let dispatch = Dispatch { driver: &driver };
        let orchestrator = Orchestrator::new(small_registry(), &store, &dispatch, OrchestratorConfig::default());
        orchestrator.run(&run_id(), json!({})).expect("first run");
        let second = orchestrator.run(&run_id(), json!({})).expect("second run is idempotent");
        assert_eq!(second.status(), RunStatus::Complete);
        assert_eq!(second.steps().get("ingestion").expect("present").attempts, 1);
    }
}
