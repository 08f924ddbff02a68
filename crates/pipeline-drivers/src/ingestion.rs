// crates/pipeline-drivers/src/ingestion.rs
// ============================================================================
// Module: Ingestion driver
// Description: Loads the source dataset and produces the data_profile
//              artifact plus a dataset fingerprint.
// ============================================================================

//! The only critical, always-first step (spec.md §4.5). Grounded on the
//! original implementation's ingestion branch of `orchestrator.py`, which
//! loads the upload, computes a schema/row-count fingerprint, and (when a
//! prior baseline profile exists for the same shape) a `drift_report`.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use sha2::Digest;

use crate::config;
use crate::dataset::Dataset;

/// Loads the dataset referenced by `run_config.input_path`, profiles its
/// shape, and writes `data_profile` (plus an optional `drift_report`
/// against a prior run's profile for the same column set).
#[derive(Debug, Default)]
pub struct IngestionDriver;

fn column_type(dataset: &Dataset, index: usize) -> &'static str {
    if dataset.is_numeric_column(index) {
        "numeric"
    } else if dataset.is_datetime_column(index) {
        "datetime"
    } else {
        "categorical"
    }
}

fn fingerprint(dataset: &Dataset) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(dataset.columns.join(",").as_bytes());
    hasher.update(dataset.row_count().to_le_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

impl StepDriver for IngestionDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ExecutionFailed(
                "run_config.input_path is required for ingestion".to_owned(),
            ));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let size_mb = std::fs::metadata(&path)
            .map(|metadata| metadata.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        let column_types: Vec<&'static str> = (0..dataset.column_count())
            .map(|index| column_type(&dataset, index))
            .collect();
        let profile = json!({
            "row_count": dataset.row_count(),
            "column_count": dataset.column_count(),
            "columns": dataset.columns,
            "column_types": dataset.columns.iter().zip(column_types.iter())
                .map(|(name, kind)| json!({"name": name, "kind": kind}))
                .collect::<Vec<_>>(),
            "null_rate": dataset.null_rate(),
            "fingerprint": fingerprint(&dataset),
            "size_mb": size_mb,
        });

        let mut artifacts = vec![("data_profile".to_owned(), profile)];

        if let Ok(baseline_name) = ArtifactName::new("data_profile") {
            if let Ok(baseline) = ctx.store.read(&ctx.run_id, &baseline_name) {
                let baseline_columns = baseline
                    .get("columns")
                    .and_then(|value| value.as_array())
                    .map(|items| items.len())
                    .unwrap_or(dataset.column_count());
                let drifted = baseline_columns != dataset.column_count();
                artifacts.push((
                    "drift_report".to_owned(),
                    json!({
                        "status": if drifted { "drifted" } else { "stable" },
                        "flagged": drifted,
                        "baseline_column_count": baseline_columns,
                        "current_column_count": dataset.column_count(),
                    }),
                ));
            }
        }

        Ok(StepOutcome { artifacts })
    }
}
