// crates/pipeline-drivers/src/config.rs
// ============================================================================
// Module: Run-config accessors
// Description: Typed reads over the free-form run_config JSON map.
// ============================================================================

//! spec.md §6 leaves `run_config` as a free-form map; this module centralizes
//! the handful of recognized keys so individual drivers don't each grow their
//! own ad hoc `Value` traversal.

use serde_json::Value;

/// Reads the dataset's on-disk path, preferring `input_path` and falling
/// back to `input_ref` (the name used at the HTTP submission boundary).
#[must_use]
pub fn input_path(run_config: &Value) -> Option<String> {
    run_config
        .get("input_path")
        .or_else(|| run_config.get("input_ref"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Reads `target_column`, if configured.
#[must_use]
pub fn target_column(run_config: &Value) -> Option<String> {
    run_config
        .get("target_column")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Reads `fast_mode` as a bool-like value (accepts JSON bool, or the
/// strings `"true"`/`"1"`).
#[must_use]
pub fn fast_mode(run_config: &Value) -> bool {
    bool_like(run_config.get("fast_mode"))
}

/// Reads `include_categoricals` as a bool-like value.
#[must_use]
pub fn include_categoricals(run_config: &Value) -> bool {
    bool_like(run_config.get("include_categoricals"))
}

fn bool_like(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => matches!(text.as_str(), "true" | "1" | "yes"),
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        _ => false,
    }
}

/// Reads `feature_whitelist` as a list of column names, accepting either a
/// JSON array or a comma-separated string.
#[must_use]
pub fn feature_whitelist(run_config: &Value) -> Option<Vec<String>> {
    match run_config.get("feature_whitelist") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        Some(Value::String(text)) => Some(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}
