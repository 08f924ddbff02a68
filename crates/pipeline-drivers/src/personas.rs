// crates/pipeline-drivers/src/personas.rs
// ============================================================================
// Module: Personas driver
// Description: Narrative-free persona labels derived from segment_profile.
// ============================================================================

//! Exempt from eligibility gating. Reads `segment_profile` (written by the
//! overseer step) and attaches a short descriptive label to each segment.
//! When no segmentation is available the driver still succeeds with an
//! empty persona list rather than failing the step.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use serde_json::Value;

fn label_for(segment_name: &str) -> &'static str {
    match segment_name {
        "low" => "Conservative cohort",
        "high" => "High-value cohort",
        _ => "Typical cohort",
    }
}

/// Produces `persona_profiles`.
#[derive(Debug, Default)]
pub struct PersonasDriver;

impl StepDriver for PersonasDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let name = ArtifactName::new("segment_profile")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let segments = ctx.store.read(&ctx.run_id, &name).ok();

        let empty = Vec::new();
        let personas: Vec<_> = segments
            .as_ref()
            .and_then(|document| document.get("segments"))
            .and_then(Value::as_array)
            .unwrap_or(&empty)
            .iter()
            .map(|segment| {
                let segment_name = segment.get("name").and_then(Value::as_str).unwrap_or("unknown");
                json!({
                    "segment": segment_name,
                    "persona_label": label_for(segment_name),
                    "count": segment.get("count").cloned().unwrap_or(json!(0)),
                })
            })
            .collect();

        Ok(StepOutcome {
            artifacts: vec![("persona_profiles".to_owned(), json!({ "personas": personas }))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PersonasDriver;
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
    fn labels_each_segment() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("segment_profile").expect("valid");
        store
            .write(
                &run_id(),
                &name,
                &json!({"segments": [{"name": "low", "count": 3}, {"name": "high", "count": 2}]}),
            )
            .expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("personas").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = PersonasDriver.execute(&ctx).expect("personas succeeds");
        let (_, document) = &outcome.artifacts[0];
        assert_eq!(document["personas"].as_array().expect("array").len(), 2);
    }

    #[test]
    fn missing_segments_yields_empty_personas() {
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("personas").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = PersonasDriver.execute(&ctx).expect("personas succeeds");
        let (_, document) = &outcome.artifacts[0];
        assert!(document["personas"].as_array().expect("array").is_empty());
    }
}
