// crates/pipeline-drivers/src/interpreter.rs
// ============================================================================
// Module: Interpreter driver
// Description: Schema to human-readable label mapping.
// ============================================================================

//! Exempt from eligibility gating. Turns the `data_profile` column/type list
//! into a short human label per column, the kind of lightweight translation
//! the original `agents/interpreter.py` hands upstream to the narrative
//! collaborator.

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::driver::StepOutcome;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;
use serde_json::Value;

use crate::config;

fn label_for(name: &str, kind: &str, is_target: bool) -> String {
    if is_target {
        return format!("Target measure: {name}");
    }
    match kind {
        "datetime" => format!("Time identifier: {name}"),
        "numeric" => format!("Numeric measure: {name}"),
        _ => format!("Categorical attribute: {name}"),
    }
}

/// Produces `schema_labels`, a per-column human label list.
#[derive(Debug, Default)]
pub struct InterpreterDriver;

impl StepDriver for InterpreterDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let profile_name = ArtifactName::new("data_profile")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let profile = ctx
            .store
            .read(&ctx.run_id, &profile_name)
            .map_err(|_| DriverError::ArtifactUnavailable("data_profile".to_owned()))?;

        let target = config::target_column(&ctx.run_config);
        let empty = Vec::new();
        let column_types = profile
            .get("column_types")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        let labels: Vec<_> = column_types
            .iter()
            .map(|entry| {
                let name = entry.get("name").and_then(Value::as_str).unwrap_or("");
                let kind = entry.get("kind").and_then(Value::as_str).unwrap_or("categorical");
                let is_target = target.as_deref() == Some(name);
                json!({ "column": name, "label": label_for(name, kind, is_target) })
            })
            .collect();

        Ok(StepOutcome {
            artifacts: vec![("schema_labels".to_owned(), json!({ "labels": labels }))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::InterpreterDriver;
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
    fn labels_target_column_distinctly() {
        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("data_profile").expect("valid");
        store
            .write(
                &run_id(),
                &name,
                &json!({"column_types": [
                    {"name": "revenue", "kind": "numeric"},
                    {"name": "region", "kind": "categorical"},
                ]}),
            )
            .expect("seed");

        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("interpreter").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"target_column": "revenue"}),
        };
        let outcome = InterpreterDriver.execute(&ctx).expect("labeling succeeds");
        let (_, labels) = &outcome.artifacts[0];
        let entries = labels["labels"].as_array().expect("array");
        assert!(entries[0]["label"].as_str().expect("label").starts_with("Target measure"));
    }

    #[test]
    fn missing_data_profile_is_unavailable() {
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("interpreter").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        assert!(InterpreterDriver.execute(&ctx).is_err());
    }
}
