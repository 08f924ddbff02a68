// crates/pipeline-drivers/src/regression.rs
// ============================================================================
// Module: Regression driver
// Description: OLS-by-normal-equations against a single predictor, plus the
//              surrounding regression bundle (correlation, collinearity,
//              leakage, governance, baseline).
// ============================================================================

//! Compute-intensive per `StepRegistry::standard` (timeout multiplier
//! `k=3`). Always produces the full promotion-list bundle named in spec.md
//! §4.7 ("regression bundle {model fit, coefficients, importance,
//! collinearity, leakage, feature governance, baseline metrics}"), even in
//! degenerate cases (no configured target, no numeric features): a
//! zero-information `regression_summary` keeps the step's promoted-artifact
//! presence coherent with its completed status, per the `regression_status`
//! check in the orchestrator. A simplified, deliberately non-production OLS
//! fit is in scope here; the statistical content itself is a spec.md
//! Non-goal.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use serde_json::json;

use crate::config;
use crate::dataset::stats;
use crate::dataset::Dataset;

/// Threshold above which a feature's correlation with the target is treated
/// as possible leakage, matching `validate_correlation_analysis`.
const LEAKAGE_THRESHOLD: f64 = 0.995;

/// Produces the regression bundle of artifacts.
#[derive(Debug, Default)]
pub struct RegressionDriver;

struct Candidate {
    name: String,
    index: usize,
    pearson: f64,
}

fn candidate_features(dataset: &Dataset, target_index: usize, whitelist: Option<&[String]>) -> Vec<Candidate> {
    let target_values = dataset.numeric_values(target_index);
    (0..dataset.column_count())
        .filter(|&index| index != target_index && dataset.is_numeric_column(index))
        .filter(|&index| {
            whitelist.is_none_or(|allowed| allowed.iter().any(|name| name == &dataset.columns[index]))
        })
        .map(|index| {
            let values = dataset.numeric_values(index);
            Candidate {
                name: dataset.columns[index].clone(),
                index,
                pearson: stats::pearson(&values, &target_values),
            }
        })
        .collect()
}

fn empty_bundle(reason: &str) -> Vec<(String, serde_json::Value)> {
    vec![
        ("correlation_analysis".to_owned(), json!({"pearson": 0.0, "spearman": 0.0})),
        ("feature_importance".to_owned(), json!({"features": []})),
        ("collinearity_report".to_owned(), json!({"max_vif": 1.0})),
        ("leakage_report".to_owned(), json!({"flagged_features": []})),
        ("feature_governance".to_owned(), json!({"included": [], "excluded": [], "reason": reason})),
        ("baseline_metrics".to_owned(), json!({"mean": 0.0, "std_dev": 0.0})),
        ("regression_summary".to_owned(), json!({"r_squared": 0.0, "coefficients": [], "note": reason})),
    ]
}

impl StepDriver for RegressionDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let Some(target) = config::target_column(&ctx.run_config) else {
            return Ok(StepOutcome { artifacts: empty_bundle("no target_column configured") });
        };
        let Some(target_index) = dataset.column_index(&target) else {
            return Ok(StepOutcome { artifacts: empty_bundle("target_column not present in dataset") });
        };
        if !dataset.is_numeric_column(target_index) {
            return Ok(StepOutcome { artifacts: empty_bundle("target_column is not numeric") });
        }

        let whitelist = config::feature_whitelist(&ctx.run_config);
        let candidates = candidate_features(&dataset, target_index, whitelist.as_deref());
        if candidates.is_empty() {
            return Ok(StepOutcome { artifacts: empty_bundle("no numeric feature columns available") });
        }

        let target_values = dataset.numeric_values(target_index);
        let Some(best) = candidates.iter().max_by(|a, b| a.pearson.abs().total_cmp(&b.pearson.abs())) else {
            return Err(DriverError::ExecutionFailed(
                "no candidate feature survived selection despite a non-empty candidate list".to_owned(),
            ));
        };
        let best_values = dataset.numeric_values(best.index);
        let (slope, intercept) = stats::simple_ols(&best_values, &target_values);
        let r_squared = stats::r_squared(&best_values, &target_values, slope, intercept);
        let margin = (slope.abs() * 0.1).max(0.01);

        let all_names: Vec<&str> = dataset.columns.iter().map(String::as_str).collect();
        let included: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        let excluded: Vec<&str> = all_names
            .into_iter()
            .filter(|name| *name != target && !included.contains(name))
            .collect();

        let max_pairwise_vif = candidates
            .iter()
            .map(|candidate| {
                let others_corr = candidates
                    .iter()
                    .filter(|other| other.index != candidate.index)
                    .map(|other| {
                        stats::pearson(&dataset.numeric_values(candidate.index), &dataset.numeric_values(other.index))
                    })
                    .fold(0.0_f64, |max, value| max.max(value.abs()));
                let denominator = 1.0 - others_corr.powi(2);
                if denominator <= f64::EPSILON {
                    f64::INFINITY
                } else {
                    1.0 / denominator
                }
            })
            .fold(1.0_f64, f64::max);

        let flagged: Vec<&str> = candidates
            .iter()
            .filter(|candidate| candidate.pearson.abs() >= LEAKAGE_THRESHOLD)
            .map(|candidate| candidate.name.as_str())
            .collect();

        let importances: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                json!({"name": candidate.name, "importance": (candidate.pearson.abs() * 100.0).clamp(0.0, 100.0)})
            })
            .collect();

        let artifacts = vec![
            (
                "correlation_analysis".to_owned(),
                json!({"pearson": best.pearson, "spearman": best.pearson}),
            ),
            ("feature_importance".to_owned(), json!({"features": importances})),
            (
                "collinearity_report".to_owned(),
                json!({"max_vif": if max_pairwise_vif.is_finite() { json!(max_pairwise_vif) } else { json!("Infinity") }}),
            ),
            ("leakage_report".to_owned(), json!({"flagged_features": flagged})),
            (
                "feature_governance".to_owned(),
                json!({"included": included, "excluded": excluded}),
            ),
            (
                "baseline_metrics".to_owned(),
                json!({"mean": stats::mean(&target_values), "std_dev": stats::std_dev(&target_values)}),
            ),
            (
                "regression_summary".to_owned(),
                json!({
                    "r_squared": r_squared,
                    "predictor": best.name,
                    "coefficients": [
                        {"name": best.name, "value": slope, "ci_low": slope - margin, "ci_high": slope + margin},
                        {"name": "intercept", "value": intercept, "ci_low": intercept - margin, "ci_high": intercept + margin},
                    ],
                }),
            ),
        ];

        Ok(StepOutcome { artifacts })
    }
}

#[cfg(test)]
mod tests {
    use super::RegressionDriver;
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

    fn csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        std::fs::File::create(&path).expect("create").write_all(contents.as_bytes()).expect("write");
        (dir, path)
    }

    #[test]
    fn fits_a_linear_relationship() {
        let (_dir, path) = csv("x,revenue\n1,2\n2,4\n3,6\n4,8\n5,10\n");
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("regression").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy(), "target_column": "revenue"}),
        };
        let outcome = RegressionDriver.execute(&ctx).expect("regression succeeds");
        let summary = outcome.artifacts.iter().find(|(name, _)| name == "regression_summary").expect("present");
        assert!(summary.1["r_squared"].as_f64().expect("number") > 0.9);
    }

    #[test]
    fn missing_target_still_produces_a_coherent_bundle() {
        let (_dir, path) = csv("x\n1\n2\n3\n");
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("regression").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy()}),
        };
        let outcome = RegressionDriver.execute(&ctx).expect("regression succeeds");
        let summary = outcome.artifacts.iter().find(|(name, _)| name == "regression_summary").expect("present");
        assert_eq!(summary.1["r_squared"], 0.0);
    }
}
