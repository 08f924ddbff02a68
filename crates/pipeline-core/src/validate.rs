// crates/pipeline-core/src/validate.rs
// ============================================================================
// Module: Per-artifact validators
// Description: Numeric-range, structural, and cross-field artifact checks.
// ============================================================================

//! Grounded on `analytics_validation.py`'s range/structural/cross-field
//! validators. Each `validate_*` function returns a [`ValidationReport`]
//! rather than raising on the first problem, matching the original's
//! accumulate-then-report style (`_add_error`/`_add_warning`).

use serde_json::Value;

use crate::error::ValidationError;

/// One accumulated finding: either a hard error or a soft warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Stable code, e.g. `DATA_LEAKAGE_POSSIBLE`.
    pub code: String,
    /// Field or path the finding concerns.
    pub field: String,
    /// Human-readable detail.
    pub detail: String,
}

/// The accumulated result of validating one artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Hard errors; any non-empty error list means the artifact must not be
    /// promoted as-is.
    pub errors: Vec<Finding>,
    /// Soft warnings; do not block promotion.
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    /// Returns whether the artifact is clean enough to promote.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add_error(&mut self, code: &str, field: &str, detail: impl Into<String>) {
        self.errors.push(Finding {
            code: code.to_owned(),
            field: field.to_owned(),
            detail: detail.into(),
        });
    }

    fn add_warning(&mut self, code: &str, field: &str, detail: impl Into<String>) {
        self.warnings.push(Finding {
            code: code.to_owned(),
            field: field.to_owned(),
            detail: detail.into(),
        });
    }
}

fn as_number(payload: &Value, field: &str) -> Option<f64> {
    payload.get(field).and_then(Value::as_f64)
}

fn validate_range(
    report: &mut ValidationReport,
    payload: &Value,
    field: &str,
    min: f64,
    max: f64,
) -> Option<f64> {
    let Some(raw) = payload.get(field) else {
        report.add_error("METRIC_MISSING_FIELD", field, "field is missing");
        return None;
    };
    let Some(value) = raw.as_f64() else {
        report.add_error("METRIC_NOT_NUMERIC", field, "field is not numeric");
        return None;
    };
    if value < min || value > max {
        report.add_error(
            "METRIC_OUT_OF_BOUNDS",
            field,
            format!("{value} is outside [{min}, {max}]"),
        );
        return None;
    }
    Some(value)
}

/// Validates a `correlation_analysis` artifact: Pearson/Spearman in
/// `[-1, 1]`, flagging `|r| >= 0.995` as possible data leakage.
#[must_use]
pub fn validate_correlation_analysis(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in ["pearson", "spearman"] {
        if let Some(value) = validate_range(&mut report, payload, field, -1.0, 1.0) {
            if value.abs() >= 0.995 {
                report.add_warning(
                    "DATA_LEAKAGE_POSSIBLE",
                    field,
                    format!("|{field}| = {value} indicates possible leakage"),
                );
            }
        }
    }
    report
}

/// Validates a `feature_importance` artifact: each entry's `importance`
/// falls in `[0, 100]`.
#[must_use]
pub fn validate_feature_importance(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(features) = payload.get("features").and_then(Value::as_array) else {
        report.add_error("METRIC_MISSING_FIELD", "features", "field is missing or not an array");
        return report;
    };
    for (index, feature) in features.iter().enumerate() {
        let field = format!("features[{index}].importance");
        let Some(raw) = feature.get("importance") else {
            report.add_error("METRIC_MISSING_FIELD", &field, "importance is missing");
            continue;
        };
        let Some(value) = raw.as_f64() else {
            report.add_error("METRIC_NOT_NUMERIC", &field, "importance is not numeric");
            continue;
        };
        if !(0.0..=100.0).contains(&value) {
            report.add_error("METRIC_OUT_OF_BOUNDS", &field, format!("{value} outside [0, 100]"));
        }
    }
    report
}

/// Validates a `data_profile` artifact: required structural fields present.
#[must_use]
pub fn validate_data_profile(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in ["row_count", "column_count", "columns", "column_types"] {
        if payload.get(field).is_none() {
            report.add_error("METRIC_MISSING_FIELD", field, "required structural field is missing");
        }
    }
    if let Some(row_count) = as_number(payload, "row_count") {
        if row_count < 0.0 {
            report.add_error("METRIC_OUT_OF_BOUNDS", "row_count", "row_count must be non-negative");
        }
    }
    report
}

/// Validates a `dataset_classification` artifact: required fields present,
/// `temporal_structure.confidence` (if present) in `[0, 1]`.
#[must_use]
pub fn validate_dataset_classification(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in ["domain_tags", "temporal_structure", "observation_unit", "target_presence"] {
        if payload.get(field).is_none() {
            report.add_error("METRIC_MISSING_FIELD", field, "required field is missing");
        }
    }
    if let Some(confidence) = payload
        .get("temporal_structure")
        .and_then(|value| value.get("confidence"))
        .and_then(Value::as_f64)
    {
        if !(0.0..=1.0).contains(&confidence) {
            report.add_error(
                "METRIC_OUT_OF_BOUNDS",
                "temporal_structure.confidence",
                format!("{confidence} outside [0, 1]"),
            );
        }
    }
    report
}

/// Validates a `collinearity_report` artifact: VIF values are non-negative
/// (or infinite, treated specially); `max_vif >= 10` warns of
/// multicollinearity, `>= 20` (or infinite) warns of critical
/// multicollinearity.
#[must_use]
pub fn validate_collinearity_report(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(max_vif) = payload.get("max_vif") else {
        report.add_error("METRIC_MISSING_FIELD", "max_vif", "field is missing");
        return report;
    };
    if max_vif.is_string() && max_vif.as_str() == Some("Infinity") || max_vif.as_f64() == Some(f64::INFINITY) {
        report.add_warning(
            "CRITICAL_MULTICOLLINEARITY",
            "max_vif",
            "VIF infinite indicates perfect multicollinearity",
        );
        return report;
    }
    let Some(value) = max_vif.as_f64() else {
        report.add_error("METRIC_NOT_NUMERIC", "max_vif", "field is not numeric");
        return report;
    };
    if value < 0.0 {
        report.add_error("METRIC_OUT_OF_BOUNDS", "max_vif", "VIF must be non-negative");
        return report;
    }
    if value >= 20.0 {
        report.add_warning(
            "CRITICAL_MULTICOLLINEARITY",
            "max_vif",
            format!("max_vif {value} >= 20 indicates severe multicollinearity"),
        );
    } else if value >= 10.0 {
        report.add_warning(
            "HIGH_MULTICOLLINEARITY",
            "max_vif",
            format!("max_vif {value} >= 10 indicates multicollinearity"),
        );
    }
    report
}

/// Validates a `regression_summary` artifact: `r_squared` in `[0, 1]`, and
/// (when present) `ci_low <= ci_high` for each coefficient.
#[must_use]
pub fn validate_regression_summary(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_range(&mut report, payload, "r_squared", 0.0, 1.0);
    if let Some(coefficients) = payload.get("coefficients").and_then(Value::as_array) {
        for (index, coefficient) in coefficients.iter().enumerate() {
            let (Some(low), Some(high)) = (
                coefficient.get("ci_low").and_then(Value::as_f64),
                coefficient.get("ci_high").and_then(Value::as_f64),
            ) else {
                continue;
            };
            if low > high {
                report.add_error(
                    "CROSS_FIELD_INVARIANT",
                    &format!("coefficients[{index}]"),
                    format!("ci_low {low} > ci_high {high}"),
                );
            }
        }
    }
    report
}

/// Validates a `trust_evaluation` artifact: `confidence` values must carry
/// a paired meaning string.
#[must_use]
pub fn validate_trust_evaluation(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    if payload.get("confidence").is_some() && payload.get("confidence_meaning").is_none() {
        report.add_error(
            "CROSS_FIELD_INVARIANT",
            "confidence",
            "confidence is present without a paired confidence_meaning",
        );
    }
    report
}

/// Validates a `final_report` artifact: `markdown` must be present,
/// a string, and non-empty (spec.md §4.9's document-form half of the
/// final-report existence check; the file-form half is enforced by the
/// orchestrator writing `final_report.md` alongside this document).
#[must_use]
pub fn validate_final_report(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    match payload.get("markdown").and_then(Value::as_str) {
        Some(markdown) if !markdown.trim().is_empty() => {}
        Some(_) => report.add_error("METRIC_MISSING_FIELD", "markdown", "markdown is empty"),
        None => report.add_error("METRIC_MISSING_FIELD", "markdown", "markdown is missing or not a string"),
    }
    report
}

/// Dispatches to the validator registered for `artifact_name`.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownArtifact`] when no validator is
/// registered for `artifact_name` (the caller should treat the artifact as
/// `ARTIFACT_UNAVAILABLE` for validation purposes, not as a hard failure).
pub fn validate_by_name(artifact_name: &str, payload: &Value) -> Result<ValidationReport, ValidationError> {
    let report = match artifact_name {
        "correlation_analysis" => validate_correlation_analysis(payload),
        "feature_importance" => validate_feature_importance(payload),
        "data_profile" => validate_data_profile(payload),
        "dataset_classification" => validate_dataset_classification(payload),
        "collinearity_report" => validate_collinearity_report(payload),
        "regression_summary" => validate_regression_summary(payload),
        "trust_evaluation" => validate_trust_evaluation(payload),
        "final_report" => validate_final_report(payload),
        other => return Err(ValidationError::UnknownArtifact(other.to_owned())),
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::validate_by_name;
    use super::validate_collinearity_report;
    use super::validate_correlation_analysis;
    use super::validate_final_report;
    use super::validate_regression_summary;
    use serde_json::json;

    #[test]
    fn correlation_in_bounds_is_clean() {
        let report = validate_correlation_analysis(&json!({"pearson": 0.4, "spearman": 0.3}));
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn correlation_out_of_bounds_is_error() {
        let report = validate_correlation_analysis(&json!({"pearson": 1.5, "spearman": 0.3}));
        assert!(!report.is_valid());
    }

    #[test]
    fn correlation_near_one_warns_leakage() {
        let report = validate_correlation_analysis(&json!({"pearson": 0.999, "spearman": 0.2}));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].code, "DATA_LEAKAGE_POSSIBLE");
    }

    #[test]
    fn collinearity_high_vif_warns() {
        let report = validate_collinearity_report(&json!({"max_vif": 12.0}));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].code, "HIGH_MULTICOLLINEARITY");
    }

    #[test]
    fn collinearity_critical_vif_warns() {
        let report = validate_collinearity_report(&json!({"max_vif": 25.0}));
        assert_eq!(report.warnings[0].code, "CRITICAL_MULTICOLLINEARITY");
    }

    #[test]
    fn collinearity_infinite_vif_warns_critical() {
        let report = validate_collinearity_report(&json!({"max_vif": f64::INFINITY}));
        assert_eq!(report.warnings[0].code, "CRITICAL_MULTICOLLINEARITY");
    }

    #[test]
    fn regression_ci_low_above_high_is_error() {
        let report = validate_regression_summary(&json!({
            "r_squared": 0.5,
            "coefficients": [{"ci_low": 2.0, "ci_high": 1.0}]
        }));
        assert!(!report.is_valid());
    }

    #[test]
    fn unknown_artifact_is_rejected() {
        assert!(validate_by_name("no_such_artifact", &json!({})).is_err());
    }

    #[test]
    fn final_report_with_markdown_is_clean() {
        let report = validate_final_report(&json!({"markdown": "# Report\n\nbody"}));
        assert!(report.is_valid());
    }

    #[test]
    fn final_report_missing_markdown_is_error() {
        let report = validate_final_report(&json!({"synthesized": true}));
        assert!(!report.is_valid());
    }

    #[test]
    fn final_report_with_blank_markdown_is_error() {
        let report = validate_final_report(&json!({"markdown": "   "}));
        assert!(!report.is_valid());
    }

    #[test]
    fn final_report_is_dispatched_by_name() {
        assert!(validate_by_name("final_report", &json!({"markdown": "x"})).expect("known artifact").is_valid());
    }
}
