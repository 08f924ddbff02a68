// crates/pipeline-core/src/registry.rs
// ============================================================================
// Module: Step Registry
// Description: The fixed, ordered list of pipeline steps and their kinds.
// ============================================================================

//! The step registry replaces the original implementation's
//! self-mutating `PIPELINE_SEQUENCE` list (which appended `"expositor"` at
//! runtime if missing) with a typed, load-time-validated sequence: ordering
//! invariants are checked once, at construction, and can never drift at
//! runtime.

use thiserror::Error;

use crate::identifiers::StepName;

/// The functional category of a step, used by eligibility and retry policy.
/// Matches spec.md §4.5's `kind ∈ {foundational, analytic, narrative,
/// governance}` literally, rather than collapsing it to a pass/gated
/// distinction: spec.md §8's boundary test ("Validator with
/// `can_proceed=false`: all `{overseer, regression, personas, fabricator}`
/// steps are skipped") names exactly the `Analytic` steps below as the ones
/// eligibility gating applies to — every other kind is exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// A structural/classification step that always runs regardless of
    /// validation outcome (ingestion, type identification, validation
    /// itself, scanning, interpretation, time-series, anomaly sentry).
    Foundational,
    /// A heavier analytic step subject to eligibility gating on the
    /// validator's `can_proceed` verdict: overseer, regression, personas,
    /// fabricator.
    Analytic,
    /// Produces the final human-facing report; always eligible, always
    /// critical.
    Narrative,
    /// Governance/trust evaluation; always eligible, never critical.
    Governance,
}

/// A single step's static configuration.
#[derive(Debug, Clone)]
pub struct StepSpec {
    /// The step's name, also its artifact-name prefix.
    pub name: StepName,
    /// Functional category.
    pub kind: StepKind,
    /// Whether a failure of this step fails the whole run (vs. degrading
    /// gracefully).
    pub critical: bool,
    /// Whether this step multiplies its base timeout by the
    /// compute-intensive factor (`k=3` vs `k=2`) per the dynamic per-step
    /// timeout formula.
    pub compute_intensive: bool,
    /// The step's declared time budget in seconds, the upper bound in
    /// spec.md §4.6's `min(dataset_derived_timeout, step.time_budget_seconds)`.
    pub time_budget_seconds: u64,
}

/// Errors raised while constructing or validating a [`StepRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry was empty.
    #[error("step registry must not be empty")]
    Empty,
    /// No `kind: Governance` step is present, and the `kind: Narrative` step
    /// was not last.
    #[error("narrative step {0:?} must be the final step when no governance step is present")]
    ReportNotLast(String),
    /// A `kind: Governance` step is present but was not last.
    #[error("governance step {0:?} must be the final step when present")]
    GovernanceNotLast(String),
    /// Two steps shared the same name.
    #[error("duplicate step name {0:?}")]
    DuplicateName(String),
}

/// The ordered, validated sequence of steps for a run.
///
/// # Invariants
/// - Non-empty.
/// - Exactly one step has `kind: Narrative`, present somewhere in the order.
/// - If a `kind: Governance` step is present, it is the final step;
///   otherwise the `kind: Narrative` step is the final step (spec.md §4.5
///   invariant 2).
/// - Step names are unique.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<StepSpec>,
}

impl StepRegistry {
    /// Constructs a registry from an explicit step list, validating the
    /// ordering invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the list is empty, contains duplicate
    /// names, or a governance step (if present) or otherwise the narrative
    /// step is not last.
    pub fn new(mut steps: Vec<StepSpec>) -> Result<Self, RegistryError> {
        if steps.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for step in &steps {
            if !seen.insert(step.name.as_str().to_owned()) {
                return Err(RegistryError::DuplicateName(step.name.as_str().to_owned()));
            }
        }

        // spec.md §4.5 invariant 1: the narrative step MUST be present; if
        // absent, the loader injects it rather than failing at load time.
        if !steps.iter().any(|step| matches!(step.kind, StepKind::Narrative)) {
            steps.push(StepSpec {
                name: StepName::new("expositor").map_err(|_| RegistryError::Empty)?,
                kind: StepKind::Narrative,
                critical: true,
                compute_intensive: false,
                time_budget_seconds: 900,
            });
        }

        // spec.md §4.5 invariant 2, literally: if a governance step is
        // present, IT must be last; otherwise the narrative step must be
        // last.
        let governance = steps.iter().find(|step| matches!(step.kind, StepKind::Governance));
        let narrative = steps.iter().find(|step| matches!(step.kind, StepKind::Narrative));
        let Some(last) = steps.last() else {
            return Err(RegistryError::Empty);
        };
        if let Some(governance) = governance {
            if !matches!(last.kind, StepKind::Governance) {
                return Err(RegistryError::GovernanceNotLast(governance.name.as_str().to_owned()));
            }
        } else if let Some(narrative) = narrative {
            if !matches!(last.kind, StepKind::Narrative) {
                return Err(RegistryError::ReportNotLast(narrative.name.as_str().to_owned()));
            }
        }
        Ok(Self { steps })
    }

    /// Returns the standard production step sequence, reconstructed from the
    /// original implementation's agent-name usage.
    ///
    /// # Panics
    ///
    /// Never panics: every name here is a valid step-name token, checked by
    /// unit tests.
    #[must_use]
    #[allow(clippy::missing_panics_doc, reason = "names are compile-time constants")]
    pub fn standard() -> Self {
        let spec = |name: &str, kind: StepKind, critical: bool, compute_intensive: bool, time_budget_seconds: u64| StepSpec {
            name: StepName::new(name).expect("standard step names are valid tokens"),
            kind,
            critical,
            compute_intensive,
            time_budget_seconds,
        };
        let steps = vec![
            spec("ingestion", StepKind::Foundational, true, false, 900),
            spec("type_identifier", StepKind::Foundational, false, false, 300),
            spec("validator", StepKind::Foundational, false, false, 300),
            spec("scanner", StepKind::Foundational, false, false, 600),
            spec("interpreter", StepKind::Foundational, false, false, 300),
            spec("overseer", StepKind::Analytic, false, true, 1_800),
            spec("regression", StepKind::Analytic, false, true, 1_800),
            spec("time_series", StepKind::Foundational, false, true, 1_200),
            spec("sentry", StepKind::Foundational, false, false, 600),
            spec("personas", StepKind::Analytic, false, false, 600),
            spec("fabricator", StepKind::Analytic, false, false, 600),
            spec("expositor", StepKind::Narrative, true, false, 900),
            spec("trust_evaluation", StepKind::Governance, false, false, 300),
        ];
        Self::new(steps).expect("standard sequence satisfies registry invariants")
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns whether the registry is empty (never true for a constructed
    /// registry, present for API completeness/clippy parity).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks up a step spec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.name.as_str() == name)
    }

    /// Returns the narrative step that produces the final report. Not
    /// necessarily the last step in execution order: when a governance step
    /// is present it runs after the narrative step (spec.md §4.5 invariant
    /// 2), so this looks up the step by `kind` rather than by position.
    #[must_use]
    pub fn report_step(&self) -> &StepSpec {
        self.steps
            .iter()
            .find(|step| matches!(step.kind, StepKind::Narrative))
            .unwrap_or_else(|| &self.steps[self.steps.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::RegistryError;
    use super::StepKind;
    use super::StepRegistry;
    use super::StepSpec;
    use crate::identifiers::StepName;

    fn spec(name: &str, kind: StepKind) -> StepSpec {
        StepSpec {
            name: StepName::new(name).expect("valid"),
            kind,
            critical: false,
            compute_intensive: false,
            time_budget_seconds: 900,
        }
    }

    #[test]
    fn standard_registry_is_valid() {
        let registry = StepRegistry::standard();
        assert_eq!(registry.report_step().name.as_str(), "expositor");
        assert!(!registry.is_empty());
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert_eq!(StepRegistry::new(Vec::new()), Err(RegistryError::Empty));
    }

    #[test]
    fn report_step_must_be_last() {
        let steps = vec![spec("expositor", StepKind::Narrative), spec("scanner", StepKind::Analytic)];
        assert!(matches!(
            StepRegistry::new(steps),
            Err(RegistryError::ReportNotLast(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let steps = vec![spec("scanner", StepKind::Analytic), spec("scanner", StepKind::Analytic)];
        assert!(matches!(
            StepRegistry::new(steps),
            Err(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn governance_after_narrative_is_accepted() {
        let steps = vec![
            spec("scanner", StepKind::Analytic),
            spec("expositor", StepKind::Narrative),
            spec("trust_evaluation", StepKind::Governance),
        ];
        let registry = StepRegistry::new(steps).expect("governance last is valid");
        assert_eq!(registry.report_step().name.as_str(), "expositor");
    }

    #[test]
    fn governance_not_last_is_rejected_even_if_narrative_is() {
        let steps = vec![
            spec("trust_evaluation", StepKind::Governance),
            spec("expositor", StepKind::Narrative),
        ];
        assert!(matches!(
            StepRegistry::new(steps),
            Err(RegistryError::GovernanceNotLast(_))
        ));
    }

    #[test]
    fn missing_narrative_step_is_injected() {
        let steps = vec![spec("scanner", StepKind::Analytic)];
        let registry = StepRegistry::new(steps).expect("injection succeeds");
        assert_eq!(registry.report_step().name.as_str(), "expositor");
    }
}
