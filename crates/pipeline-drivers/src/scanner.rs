// crates/pipeline-drivers/src/scanner.rs
// ============================================================================
// Module: Scanner driver
// Description: Per-column profile (counts, null rate, dtype, basic stats).
// ============================================================================

//! Exempt from eligibility gating (spec.md §4.7 "Certain steps are exempt").
//! Reloads the dataset and reports a deeper per-column profile than the
//! coarse `data_profile` the ingestion step writes.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use serde_json::json;

use crate::config;
use crate::dataset::Dataset;
use crate::dataset::stats;

/// Produces `column_profiles`, one entry per column.
#[derive(Debug, Default)]
pub struct ScannerDriver;

impl StepDriver for ScannerDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let profiles: Vec<_> = (0..dataset.column_count())
            .map(|index| {
                let is_numeric = dataset.is_numeric_column(index);
                let cells = dataset.column(index);
                let null_count = cells.iter().filter(|cell| cell.is_null()).count();
                let values = dataset.numeric_values(index);
                json!({
                    "name": dataset.columns[index],
                    "dtype": if is_numeric { "numeric" } else { "categorical" },
                    "null_rate": stats::ratio(null_count, cells.len()),
                    "mean": if is_numeric { Some(stats::mean(&values)) } else { None },
                    "std_dev": if is_numeric { Some(stats::std_dev(&values)) } else { None },
                })
            })
            .collect();

        Ok(StepOutcome {
            artifacts: vec![("column_profiles".to_owned(), json!({ "columns": profiles }))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ScannerDriver;
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
    fn profiles_each_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        std::fs::File::create(&path)
            .expect("create")
            .write_all(b"revenue,region\n10,east\n,west\n30,east\n")
            .expect("write");

        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("scanner").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy()}),
        };
        let outcome = ScannerDriver.execute(&ctx).expect("scan succeeds");
        let (_, report) = &outcome.artifacts[0];
        let columns = report["columns"].as_array().expect("array");
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0]["dtype"], "numeric");
        assert!(columns[0]["null_rate"].as_f64().expect("rate") > 0.0);
    }

    #[test]
    fn missing_input_path_is_unavailable() {
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("scanner").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        assert!(ScannerDriver.execute(&ctx).is_err());
    }
}
