// crates/pipeline-drivers/src/type_identifier.rs
// ============================================================================
// Module: Type identifier driver
// Description: Heuristic dataset classification from the ingested profile.
// ============================================================================

//! Reads `data_profile` and reloads the dataset to classify its shape:
//! whether it carries a temporal column, what its rows represent, and
//! whether a usable target is configured. Exempt from eligibility gating
//! (spec.md §4.7 "Certain steps are exempt").

use pipeline_core::driver::DriverError;
use pipeline_core::driver::StepContext;
use pipeline_core::driver::StepDriver;
use pipeline_core::identifiers::ArtifactName;
use serde_json::json;

use crate::config;
use crate::dataset::Dataset;

/// Classifies the dataset's temporal structure, observation unit, and
/// target presence.
#[derive(Debug, Default)]
pub struct TypeIdentifierDriver;

impl StepDriver for TypeIdentifierDriver {
    fn execute(&self, ctx: &StepContext<'_>) -> Result<pipeline_core::driver::StepOutcome, DriverError> {
        let profile_name = ArtifactName::new("data_profile")
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;
        let profile = ctx
            .store
            .read(&ctx.run_id, &profile_name)
            .map_err(|_| DriverError::ArtifactUnavailable("data_profile".to_owned()))?;

        let Some(path) = config::input_path(&ctx.run_config) else {
            return Err(DriverError::ArtifactUnavailable("data_profile".to_owned()));
        };
        let dataset = Dataset::load(std::path::Path::new(&path))
            .map_err(|error| DriverError::ExecutionFailed(error.to_string()))?;

        let datetime_columns: Vec<&str> = dataset
            .columns
            .iter()
            .enumerate()
            .filter(|(index, _)| dataset.is_datetime_column(*index))
            .map(|(_, name)| name.as_str())
            .collect();
        let has_datetime = !datetime_columns.is_empty();
        let confidence = if has_datetime { 0.8 } else { 0.1 };

        let target = config::target_column(&ctx.run_config);
        let target_presence = target
            .as_deref()
            .map(|name| dataset.column_index(name).is_some())
            .unwrap_or(false);

        let row_count = profile.get("row_count").and_then(serde_json::Value::as_u64).unwrap_or(0);
        let observation_unit = if row_count <= 1 {
            "single_observation"
        } else if has_datetime {
            "time_indexed_record"
        } else {
            "tabular_record"
        };

        let domain_tags: Vec<&str> = if has_datetime && target_presence {
            vec!["time_series", "supervised"]
        } else if target_presence {
            vec!["supervised"]
        } else {
            vec!["exploratory"]
        };

        let classification = json!({
            "domain_tags": domain_tags,
            "temporal_structure": {
                "has_datetime": has_datetime,
                "datetime_columns": datetime_columns,
                "confidence": confidence,
            },
            "observation_unit": observation_unit,
            "target_presence": target_presence,
        });

        Ok(pipeline_core::driver::StepOutcome {
            artifacts: vec![("dataset_classification".to_owned(), classification)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TypeIdentifierDriver;
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
    fn classifies_supervised_time_series_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        std::fs::File::create(&path)
            .expect("create")
            .write_all(b"date,revenue\n2024-01-01,10\n2024-01-02,12\n")
            .expect("write");

        let store = InMemoryArtifactStore::new();
        let name = ArtifactName::new("data_profile").expect("valid");
        store
            .write(&run_id(), &name, &json!({"row_count": 2, "column_count": 2}))
            .expect("seed profile");

        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("type_identifier").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({"input_path": path.to_string_lossy(), "target_column": "revenue"}),
        };
        let outcome = TypeIdentifierDriver.execute(&ctx).expect("classification succeeds");
        let (_, classification) = &outcome.artifacts[0];
        assert_eq!(classification["target_presence"], true);
        assert_eq!(classification["temporal_structure"]["has_datetime"], true);
    }

    #[test]
    fn missing_data_profile_is_unavailable() {
        let store = InMemoryArtifactStore::new();
        let ctx = StepContext {
            run_id: run_id(),
            step: StepName::new("type_identifier").expect("valid"),
            attempt: 1,
            store: &store,
            run_config: json!({}),
        };
        assert!(TypeIdentifierDriver.execute(&ctx).is_err());
    }
}
