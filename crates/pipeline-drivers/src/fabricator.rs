// crates/pipeline-drivers/src/fabricator.rs
// ============================================================================
// Module: Fabricator driver
// Description: Strategy recommendations derived from feature_importance.
// ============================================================================

//! Exempt from eligibility gating. Turns the top-ranked features from
//! `feature_importance` into short recommendation strings; a simplified
//! stand-in for the original's strategy-generation agent, which otherwise
//! calls out to an LLM collaborator (out of scope per spec.md §1).

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use serde_json::Value;

/// Maximum number of recommendations emitted, highest importance first.
const MAX_RECOMMENDATIONS: usize = 3;

/// Produces `strategy_recommendations`.
#[derive(Debug, Default)]
pub struct FabricatorDriver;

impl StepDriver for FabricatorDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let name = ArtifactName::new("feature_importance")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let importance = ctx.store.read(&ctx.run_id, &name).ok();

        let empty = Vec::new();
        let mut features: Vec<(String, f64)> = importance
            .as_ref()
            .and_then(|document| document.get("features"))
            .and_then(Value::as_array)
            .unwrap_or(&empty)
            .iter()
            .filter_map(|feature| {
                let name = feature.get("name").and_then(Value::as_str)?;
                let score = feature.get("importance").and_then(Value::as_f64)?;
                Some((name.to_owned(), score))
            })
            .collect();
        features.sort_by(|a, b| b.1.total_cmp(&a.1));

        let recommendations: Vec<_> = features
            .into_iter()
            .take(MAX_RECOMMENDATIONS)
            .map(|(name, score)| {
                json!({
                    "recommendation": format!("Prioritize monitoring {name}: importance score {score:.1}"),
                    "feature": name,
                })
            })
            .collect();

        Ok(StepOutcome {
            artifacts: vec![("strategy_recommendations".to_owned(), json!({ "recommendations": recommendations }))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FabricatorDriver;
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
    fn recommends_the_highest_importance_features_first() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("feature_importance").expect("valid");
        store
            .write(
                &run_id(),
                &name,
                &json!({"features": [
                    {"name": "a", "importance": 10.0},
                    {"name": "b", "importance": 90.0},
                ]}),
            )
            .expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("fabricator").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = FabricatorDriver.execute(&ctx).expect("fabrication succeeds");
        let (_, document) = &outcome.artifacts[0];
        let recommendations = document["recommendations"].as_array().expect("array");
        assert_eq!(recommendations[0]["feature"], "b");
    }
}
