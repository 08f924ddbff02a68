// crates/pipeline-drivers/src/trust_evaluation.rs
// ============================================================================
// Module: Trust evaluation driver
// Description: Aggregates manifest warnings/errors into a trust score.
// ============================================================================

//! Governance kind per `StepRegistry::standard`: always eligible, never
//! critical. Reads the `run_manifest` artifact (persisted by the
//! orchestrator after every step, spec.md §4.2) and derives a confidence
//! score from its accumulated warning/error counts.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use serde_json::Value;

/// Confidence penalty applied per accumulated error-severity warning.
const ERROR_PENALTY: f64 = 0.2;
/// Confidence penalty applied per accumulated warning-severity warning.
const WARNING_PENALTY: f64 = 0.05;

fn confidence_meaning(confidence: f64) -> &'static str {
    if confidence >= 0.8 {
        "high confidence: few or no validation findings"
    } else if confidence >= 0.5 {
        "moderate confidence: some findings were recorded"
    } else {
        "low confidence: multiple findings were recorded"
    }
}

/// Produces `trust_evaluation`.
#[derive(Debug, Default)]
pub struct TrustEvaluationDriver;

impl StepDriver for TrustEvaluationDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let name = ArtifactName::new("run_manifest")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let manifest = ctx.store.read(&ctx.run_id, &name).ok();

        let empty = Vec::new();
        let warnings = manifest
            .as_ref()
            .and_then(|document| document.get("warnings"))
            .and_then(Value::as_array)
            .unwrap_or(&empty);
        let error_count = warnings
            .iter()
            .filter(|warning| warning.get("severity").and_then(Value::as_str) == Some("error"))
            .count();
        let warning_count = warnings
            .iter()
            .filter(|warning| warning.get("severity").and_then(Value::as_str) == Some("warning"))
            .count();

        let as_f64 = |count: usize| -> f64 { u32::try_from(count).unwrap_or(u32::MAX).into() };
        let confidence = (1.0 - as_f64(error_count) * ERROR_PENALTY - as_f64(warning_count) * WARNING_PENALTY)
            .clamp(0.0, 1.0);

        Ok(StepOutcome {
            artifacts: vec![(
                "trust_evaluation".to_owned(),
                json!({
                    "confidence": confidence,
                    "confidence_meaning": confidence_meaning(confidence),
                    "error_count": error_count,
                    "warning_count": warning_count,
                }),
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TrustEvaluationDriver;
    use pipeline_core::driver::StepContext;
    use pipeline_core::driver::StepDriver;
    use pipeline_core::identifiers::ArtifactName;
    use pipeline_core::identifiers::RunId;
    use pipeline_core::identifiers::StepName;
    use pipeline_core::store::ArtifactStore;
    use pipeline_core::store::InMemoryArtifactStore;
    use serde_json::json;

    fn run_id() -> RunId {
        RunId::new("a1b2c3d4-e5f6-4789-a012-3456789abcde").expect("valid")
    }

    #[test]
    fn clean_manifest_yields_high_confidence() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("run_manifest").expect("valid");
        store.write(&run_id(), &name, &json!({"warnings": []})).expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("trust_evaluation").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = TrustEvaluationDriver.execute(&ctx).expect("evaluation succeeds");
        let (_, document) = &outcome.artifacts[0];
        assert_eq!(document["confidence"], 1.0);
        assert!(document.get("confidence_meaning").is_some());
    }

    #[test]
    fn errors_lower_confidence() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("run_manifest").expect("valid");
        store
            .write(
                &run_id(),
                &name,
                &json!({"warnings": [
                    {"severity": "error"}, {"severity": "error"}, {"severity": "warning"},
                ]}),
            )
            .expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("trust_evaluation").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = TrustEvaluationDriver.execute(&ctx).expect("evaluation succeeds");
        let (_, document) = &outcome.artifacts[0];
        assert!(document["confidence"].as_f64().expect("number") < 0.7);
    }
}
