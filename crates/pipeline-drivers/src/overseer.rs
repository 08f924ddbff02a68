// crates/pipeline-drivers/src/overseer.rs
// ============================================================================
// Module: Overseer driver
// Description: Quantile-based segmentation over the target (or first
//              numeric) column.
// ============================================================================

//! Compute-intensive per `StepRegistry::standard` (timeout multiplier
//! `k=3`). A simplified stand-in for the original's clustering agent:
//! splits the chosen numeric column into low/medium/high tertiles rather
//! than running an actual clustering algorithm, which is explicitly out of
//! scope (analytical algorithm content is a spec.md Non-goal).

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use serde_json::json;

use crate::config;
use crate::dataset::stats;
use crate::dataset::Dataset;

/// Produces `segment_profile`.
#[derive(Debug, Default)]
pub struct OverseerDriver;

fn chosen_column(dataset: &Dataset, target: Option<&str>) -> Option<usize> {
    if let Some(target) = target {
        if let Some(index) = dataset.column_index(target) {
            if dataset.is_numeric_column(index) {
                return Some(index);
            }
        }
    }
    (0..dataset.column_count()).find(|&index| dataset.is_numeric_column(index))
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * stats::f64_from_usize(sorted.len() - 1);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - (lower as f64);
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

impl StepDriver for OverseerDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let target = config::target_column(&ctx.run_config);
        let Some(column_index) = chosen_column(&dataset, target.as_deref()) else {
            return Err(DriverError::Degraded {
                reason: "no numeric column available to segment".to_owned(),
                fallback: json!({"status": "skipped", "reason": "no numeric column"}),
            });
        };

        let mut values = dataset.numeric_values(column_index);
        values.sort_by(|a, b| a.total_cmp(b));
        let low_bound = quantile(&values, 1.0 / 3.0);
        let high_bound = quantile(&values, 2.0 / 3.0);

        let (mut low, mut medium, mut high) = (0usize, 0usize, 0usize);
        for value in &values {
            if *value <= low_bound {
                low += 1;
            } else if *value <= high_bound {
                medium += 1;
            } else {
                high += 1;
            }
        }

        let segments = json!({
            "column": dataset.columns[column_index],
            "segments": [
                {"name": "low", "count": low, "upper_bound": low_bound},
                {"name": "medium", "count": medium, "upper_bound": high_bound},
                {"name": "high", "count": high, "upper_bound": values.last().copied().unwrap_or(0.0)},
            ],
        });

        Ok(StepOutcome {
            artifacts: vec![("segment_profile".to_owned(), segments)],
        })
    }
}
