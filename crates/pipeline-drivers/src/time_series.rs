// crates/pipeline-drivers/src/time_series.rs
// ============================================================================
// Module: Time series driver
// Description: Trend direction over a detected datetime column.
// ============================================================================

//! Compute-intensive per `StepRegistry::standard`. Degrades gracefully
//! (writes a `not_applicable` fallback under the step's own artifact name)
//! when `dataset_classification` reports no datetime column, matching the
//! happy-path scenario in spec.md §8 ("time-series due to no datetime
//! column").

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use serde_json::Value;

use crate::config;
use crate::dataset::stats;
use crate::dataset::Dataset;

/// Produces `time_series_summary`, or degrades to a `not_applicable`
/// fallback under the step's own artifact name.
#[derive(Debug, Default)]
pub struct TimeSeriesDriver;

impl StepDriver for TimeSeriesDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let classification_name = ArtifactName::new("dataset_classification")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let classification = ctx
            .store
            .read(&ctx.run_id, &classification_name)
            .map_err(|_| DriverError::ArtifactUnavailable("dataset_classification".to_owned()))?;

        let has_datetime = classification
            .get("temporal_structure")
            .and_then(|value| value.get("has_datetime"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !has_datetime {
            return Err(DriverError::Degraded {
                reason: "no datetime column detected".to_owned(),
                fallback: json!({"status": "not_applicable", "reason": "no datetime column detected"}),
            });
        }

        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let target = config::target_column(&ctx.run_config);
        let numeric_index = target
            .as_deref()
            .and_then(|name| dataset.column_index(name))
            .filter(|&index| dataset.is_numeric_column(index))
            .or_else(|| (0..dataset.column_count()).find(|&index| dataset.is_numeric_column(index)));

        let Some(numeric_index) = numeric_index else {
            return Err(DriverError::Degraded {
                reason: "no numeric series to trend".to_owned(),
                fallback: json!({"status": "not_applicable", "reason": "no numeric series to trend"}),
            });
        };

        let values = dataset.numeric_values(numeric_index);
        let positions: Vec<f64> = (0..values.len()).map(stats::f64_from_usize).collect();
        let (slope, _) = stats::simple_ols(&positions, &values);
        let direction = if slope > 0.01 {
            "increasing"
        } else if slope < -0.01 {
            "decreasing"
        } else {
            "flat"
        };

        Ok(StepOutcome {
            artifacts: vec![(
                "time_series_summary".to_owned(),
                json!({"column": dataset.columns[numeric_index], "trend_direction": direction, "slope": slope}),
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TimeSeriesDriver;
    use pipeline_core::driver::DriverError;
    use pipeline_core::driver::StepContext;
    use pipeline_core::driver::StepDriver;
    use pipeline_core::identifiers::ArtifactName;
    use pipeline_core::identifiers::RunId;
    use pipeline_core::identifiers::StepName;
    use pipeline_core::store::ArtifactStore;
    use pipeline_core::store::InMemoryArtifactStore;
    use serde_json::json;
    use std::io::Write;

    fn run_id() -> RunId {
        RunId::new("a1b2c3d4-e5f6-4789-a012-3456789abcde").expect("valid")
    }

    #[test]
    fn degrades_when_no_datetime_column() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("dataset_classification").expect("valid");
        store
            .write(&run_id(), &name, &json!({"temporal_structure": {"has_datetime": false}}))
            .expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("time_series").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        assert!(matches!(TimeSeriesDriver.execute(&ctx), Err(DriverError::Degraded { .. })));
    }

    #[test]
    fn reports_increasing_trend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        std::fs::File::create(&path)
            .expect("create")
            .write_all(b"date,revenue\n2024-01-01,1\n2024-01-02,2\n2024-01-03,3\n")
            .expect("write");

        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("dataset_classification").expect("valid");
        store
            .write(&run_id(), &name, &json!({"temporal_structure": {"has_datetime": true}}))
            .expect("seed");
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("time_series").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy(), "target_column": "revenue"}),
        };
        let outcome = TimeSeriesDriver.execute(&ctx).expect("time series succeeds");
        let (_, summary) = &outcome.artifacts[0];
        assert_eq!(summary["trend_direction"], "increasing");
    }
}
