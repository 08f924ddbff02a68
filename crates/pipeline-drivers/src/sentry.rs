// crates/pipeline-drivers/src/sentry.rs
// ============================================================================
// Module: Sentry driver
// Description: Anomaly detection over numeric columns (z-score threshold).
// ============================================================================

//! Exempt from eligibility gating (spec.md §4.7 "sentry/anomaly" is in the
//! always-eligible list). Flags cells more than three standard deviations
//! from their column's mean.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use serde_json::json;

use crate::config;
use crate::dataset::stats;
use crate::dataset::Dataset;

/// Standard-deviation multiple beyond which a value is flagged anomalous.
const Z_SCORE_THRESHOLD: f64 = 3.0;

/// Produces `anomaly_report`.
#[derive(Debug, Default)]
pub struct SentryDriver;

impl StepDriver for SentryDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let mut anomalies = Vec::new();
        for index in 0..dataset.column_count() {
            if !dataset.is_numeric_column(index) {
                continue;
            }
            let values = dataset.numeric_values(index);
            let mean = stats::mean(&values);
            let std_dev = stats::std_dev(&values);
            if std_dev <= f64::EPSILON {
                continue;
            }
            for (row, cell) in dataset.column(index).iter().enumerate() {
                if let Some(value) = cell.as_number() {
                    let z = (value - mean) / std_dev;
                    if z.abs() > Z_SCORE_THRESHOLD {
                        anomalies.push(json!({
                            "column": dataset.columns[index],
                            "row": row,
                            "value": value,
                            "z_score": z,
                        }));
                    }
                }
            }
        }

        Ok(StepOutcome {
            artifacts: vec![(
                "anomaly_report".to_owned(),
                json!({"anomaly_count": anomalies.len(), "anomalies": anomalies}),
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SentryDriver;
    use pipeline_core::driver::StepContext;
    use pipeline_core::driver::StepDriver;
    use pipeline_core::identifiers::RunId;
    use pipeline_core::identifiers::StepName;
    use pipeline_core::store::InMemoryArtifactStore;
    use serde_json::json;
    use std::io::Write;

    fn run_id() -> RunId {
        RunId::new("a1b2c3d4-e5f6-4789-a012-3456789abcde").expect("valid")
    }

    #[test]
    fn flags_an_extreme_outlier() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        let mut rows = String::from("value\n");
        for _ in 0..20 {
            rows.push_str("10\n");
        }
        rows.push_str("5000\n");
        std::fs::File::create(&path).expect("create").write_all(rows.as_bytes()).expect("write");

        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("sentry").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy()}),
        };
        let outcome = SentryDriver.execute(&ctx).expect("sentry succeeds");
        let (_, report) = &outcome.artifacts[0];
        assert!(report["anomaly_count"].as_u64().expect("count") >= 1);
    }
}
