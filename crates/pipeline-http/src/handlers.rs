// crates/pipeline-http/src/handlers.rs
// ============================================================================
// Module: HTTP handlers
// Description: The six core-exposed operations (spec.md §6), thinly wired
//              to the Job Queue and Artifact Store.
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use pipeline_core::ArtifactName;
use pipeline_core::OrchestratorState;
use pipeline_core::RunId;
use pipeline_core::StepRegistry;
use pipeline_core::store::ArtifactStoreError;
use pipeline_queue::Job;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

fn parse_run_id(raw: &str) -> Result<RunId, ApiError> {
    RunId::new(raw).map_err(|error| ApiError::InvalidIdentifier(error.to_string()))
}

fn parse_artifact_name(raw: &str) -> Result<ArtifactName, ApiError> {
    ArtifactName::new(raw).map_err(|error| ApiError::InvalidIdentifier(error.to_string()))
}

/// Request body for `submit` (spec.md §6: `file_ref` + `run_config`).
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Reference to the dataset in shared storage.
    pub file_path: String,
    /// Free-form run configuration (spec.md §6's recognized options).
    #[serde(default)]
    pub run_config: Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// The newly allocated run id.
    pub run_id: String,
}

/// `submit(file_ref, run_config) -> run_id` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::Queue`] if the Job Queue backend is unavailable.
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let run_id = state.queue().enqueue(&request.file_path, request.run_config)?;
    Ok(Json(SubmitResponse {
        run_id: run_id.as_str().to_owned(),
    }))
}

/// `get_job(run_id) -> job document or absent` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::InvalidIdentifier`] if `run_id` fails its grammar, or
/// [`ApiError::Queue`] if the backend is unavailable.
pub async fn get_job(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Option<Job>>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let job = state.queue().get(&run_id)?;
    Ok(Json(job))
}

/// Pagination parameters for `list_jobs` (spec.md §6).
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    /// Maximum jobs to return (default 50).
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Jobs to skip before collecting `limit` results.
    #[serde(default)]
    pub offset: u32,
}

/// Default page size when `limit` is omitted.
const fn default_limit() -> u32 {
    50
}

/// `list_jobs(limit, offset) -> ordered list` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::Queue`] if the backend is unavailable.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = state.queue().list(query.limit, query.offset)?;
    Ok(Json(jobs))
}

/// `get_state(run_id) -> orchestrator state doc with progress` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::InvalidIdentifier`] if `run_id` fails its grammar,
/// [`ApiError::NotFound`] if no state has been recorded yet, or
/// [`ApiError::Store`] if the backend is unavailable.
pub async fn get_state(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let name = ArtifactName::new("orchestrator_state")
        .map_err(|error| ApiError::InvalidIdentifier(error.to_string()))?;
    let document = match state.store().read(&run_id, &name) {
        Ok(document) => document,
        Err(ArtifactStoreError::NotFound { .. }) => return Err(ApiError::NotFound),
        Err(error) => return Err(ApiError::Store(error)),
    };
    let total_steps = u32::try_from(StepRegistry::standard().len()).unwrap_or(u32::MAX);
    let progress = serde_json::from_value::<OrchestratorState>(document.clone())
        .map(|parsed| parsed.progress(total_steps))
        .ok();
    let mut response = document;
    if let (Some(progress), Value::Object(map)) = (progress, &mut response) {
        map.insert("progress".to_owned(), json!(progress));
    }
    Ok(Json(response))
}

/// `get_artifact(run_id, name) -> document` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::InvalidIdentifier`] if either identifier fails its
/// grammar, [`ApiError::NotFound`] if the artifact has not been promoted, or
/// [`ApiError::Store`] if the backend is unavailable.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((run_id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let name = parse_artifact_name(&name)?;
    match state.store().read(&run_id, &name) {
        Ok(document) => Ok(Json(document)),
        Err(ArtifactStoreError::NotFound { .. }) => Err(ApiError::NotFound),
        Err(error) => Err(ApiError::Store(error)),
    }
}

/// `get_manifest(run_id) -> manifest doc` (spec.md §6).
///
/// # Errors
///
/// Returns [`ApiError::InvalidIdentifier`] if `run_id` fails its grammar,
/// [`ApiError::NotFound`] if no manifest has been written yet, or
/// [`ApiError::Store`] if the backend is unavailable.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let name = ArtifactName::new("run_manifest")
        .map_err(|error| ApiError::InvalidIdentifier(error.to_string()))?;
    match state.store().read(&run_id, &name) {
        Ok(document) => Ok(Json(document)),
        Err(ArtifactStoreError::NotFound { .. }) => Err(ApiError::NotFound),
        Err(error) => Err(ApiError::Store(error)),
    }
}
