// crates/pipeline-core/src/eligibility.rs
// ============================================================================
// Module: Eligibility & Guardrails
// Description: Pure gating decision for whether a step may run this turn.
// ============================================================================

//! Generalizes the original implementation's
//! `resolve_agent_eligibility` / `is_agent_allowed_for_run` pair into a
//! single pure function. Report and governance steps are always eligible;
//! ordinary analytic steps can be blocked by a failed validation gate or
//! (optionally) by a drift-blocking policy.

use crate::registry::StepKind;
use crate::registry::StepSpec;

/// Inputs consulted when deciding whether a step is eligible to run.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityInput {
    /// Whether the upstream validator step reported `can_proceed: false`.
    pub validation_blocked: bool,
    /// Whether a drift report flagged the input as materially different
    /// from the baseline, and whether the deployment is configured to
    /// block on drift (`EngineConfig::drift_blocking`).
    pub drift_blocking_triggered: bool,
}

/// The outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityDecision {
    /// Whether the step may run.
    pub eligible: bool,
    /// Human-readable reasons supporting the decision (empty when eligible
    /// for the trivial "always eligible" case).
    pub reasons: Vec<String>,
}

/// Resolves whether `step` is eligible to run this turn.
///
/// Only [`StepKind::Analytic`] steps are gated; every other kind
/// ([`StepKind::Foundational`], [`StepKind::Narrative`],
/// [`StepKind::Governance`]) is always eligible, matching the original
/// implementation's explicit exemption list (`type_identifier, validator,
/// scanner, interpreter, trust_evaluation, expositor, sentry` are
/// unconditionally allowed) and spec.md §8's boundary test, which names
/// exactly `{overseer, regression, personas, fabricator}` — the
/// [`StepKind::Analytic`] steps in [`crate::registry::StepRegistry::standard`]
/// — as skipped when the validator reports `can_proceed=false`.
#[must_use]
pub fn resolve_eligibility(step: &StepSpec, input: EligibilityInput) -> EligibilityDecision {
    if !matches!(step.kind, StepKind::Analytic) {
        return EligibilityDecision {
            eligible: true,
            reasons: vec!["step kind is exempt from eligibility gating".to_owned()],
        };
    }
    let mut reasons = Vec::new();
    if input.validation_blocked {
        reasons.push("upstream validation reported can_proceed=false".to_owned());
    }
    if input.drift_blocking_triggered {
        reasons.push("drift blocking policy rejected the input".to_owned());
    }
    EligibilityDecision {
        eligible: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_eligibility;
    use super::EligibilityInput;
    use crate::identifiers::StepName;
    use crate::registry::StepKind;
    use crate::registry::StepSpec;

    fn analytic(name: &str) -> StepSpec {
        StepSpec {
            name: StepName::new(name).expect("valid"),
            kind: StepKind::Analytic,
            critical: false,
            compute_intensive: false,
            time_budget_seconds: 900,
        }
    }

    fn report(name: &str) -> StepSpec {
        StepSpec {
            name: StepName::new(name).expect("valid"),
            kind: StepKind::Narrative,
            critical: true,
            compute_intensive: false,
            time_budget_seconds: 900,
        }
    }

    #[test]
    fn report_step_always_eligible() {
        let decision = resolve_eligibility(
            &report("expositor"),
            EligibilityInput {
                validation_blocked: true,
                drift_blocking_triggered: true,
            },
        );
        assert!(decision.eligible);
    }

    #[test]
    fn analytic_step_blocked_by_validation() {
        let decision = resolve_eligibility(
            &analytic("regression"),
            EligibilityInput {
                validation_blocked: true,
                drift_blocking_triggered: false,
            },
        );
        assert!(!decision.eligible);
        assert_eq!(decision.reasons.len(), 1);
    }

    #[test]
    fn analytic_step_eligible_by_default() {
        let decision = resolve_eligibility(
            &analytic("regression"),
            EligibilityInput {
                validation_blocked: false,
                drift_blocking_triggered: false,
            },
        );
        assert!(decision.eligible);
        assert!(decision.reasons.is_empty());
    }
}
