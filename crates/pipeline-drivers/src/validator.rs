// crates/pipeline-drivers/src/validator.rs
// ============================================================================
// Module: Validator driver
// Description: Structural + variance checks producing can_proceed.
// ============================================================================

//! Reads `data_profile` and `dataset_classification` and produces
//! `validation_report`, the artifact [`pipeline_core::eligibility`]
//! consults to gate downstream analytic steps (spec.md §4.7 step 2).
//! `validation_report` carries no dedicated promotion validator (it is not
//! on the promotion list in spec.md §4.7), so it is written and promoted
//! without a validation gate.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;

use crate::dataset::stats;

/// Minimum row count below which most analytic steps are considered
/// not applicable (spec.md §8 "Single-row dataset" boundary behavior).
const MIN_ROWS_FOR_ANALYSIS: u64 = 2;

/// Computes `can_proceed` and a `data_quality_score` from the ingested
/// profile's null rate and row count.
#[derive(Debug, Default)]
pub struct ValidatorDriver;

impl StepDriver for ValidatorDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let profile_name = ArtifactName::new("data_profile")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let profile = ctx
            .store
            .read(&ctx.run_id, &profile_name)
            .map_err(|_| DriverError::ArtifactUnavailable("data_profile".to_owned()))?;

        let row_count = profile.get("row_count").and_then(serde_json::Value::as_u64).unwrap_or(0);
        let null_rate = profile.get("null_rate").and_then(serde_json::Value::as_f64).unwrap_or(0.0);

        let mut reasons = Vec::new();
        if row_count == 0 {
            reasons.push("dataset has zero rows".to_owned());
        }
        if row_count < MIN_ROWS_FOR_ANALYSIS {
            reasons.push("dataset has fewer than two rows".to_owned());
        }
        if null_rate >= 0.5 {
            reasons.push(format!("null rate {null_rate:.2} is at or above 0.5"));
        }

        let can_proceed = row_count > 0;
        let data_quality_score = stats::ratio(1, 1).min(1.0 - null_rate).max(0.0);

        let report = json!({
            "can_proceed": can_proceed,
            "data_quality_score": data_quality_score,
            "row_count": row_count,
            "null_rate": null_rate,
            "reasons": reasons,
        });

        Ok(StepOutcome {
            artifacts: vec![("validation_report".to_owned(), report)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ValidatorDriver;
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

    fn seed_profile(store: &InMemoryArtifactStore, row_count: u64, null_rate: f64) {
        let name = ArtifactName::new("data_profile").expect("valid");
        store
            .write(&run_id(), &name, &json!({"row_count": row_count, "null_rate": null_rate}))
            .expect("seed");
    }

    #[test]
    fn low_quality_dataset_still_proceeds_but_scores_low() {
        let store = InMemoryArtifactStore::new();
        seed_profile(&store, 50, 0.6);
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("validator").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = ValidatorDriver.execute(&ctx).expect("validation succeeds");
        let (_, report) = &outcome.artifacts[0];
        assert_eq!(report["can_proceed"], true);
        assert!(report["data_quality_score"].as_f64().expect("number") < 0.5);
    }

    #[test]
    fn empty_dataset_cannot_proceed() {
        let store = InMemoryArtifactStore::new();
        seed_profile(&store, 0, 0.0);
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("validator").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        let outcome = ValidatorDriver.execute(&ctx).expect("validation succeeds");
        let (_, report) = &outcome.artifacts[0];
        assert_eq!(report["can_proceed"], false);
    }
}
