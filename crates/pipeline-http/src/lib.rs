// crates/pipeline-http/src/lib.rs
// ============================================================================
// Module: Pipeline HTTP
// Description: The single canonical HTTP surface for the six run-lifecycle
//              operations (spec.md §6).
// Dependencies: axum, pipeline-core, pipeline-queue, tokio, tracing
// ============================================================================

//! Grounded on `original_source/backend/api/server.py`'s route list, pared
//! down to the six transport-agnostic core operations it fronts: `submit`,
//! `get_job`, `list_jobs`, `get_state`, `get_artifact`, `get_manifest`.
//! Auth, tenancy, rate limiting, CORS, and every other route the original
//! server exposes are out of scope here; clients that need them sit in
//! front of this surface.
//!
//! `run_id` and artifact names are validated against their identifier
//! grammars before any store access, so a malformed path segment never
//! reaches the backend (spec.md §6).

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

/// Builds the full router: one axum app wiring the six operations to their
/// handlers.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(handlers::submit))
        .route("/runs", get(handlers::list_jobs))
        .route("/runs/{run_id}", get(handlers::get_job))
        .route("/runs/{run_id}/state", get(handlers::get_state))
        .route("/runs/{run_id}/manifest", get(handlers::get_manifest))
        .route("/runs/{run_id}/artifacts/{name}", get(handlers::get_artifact))
        .with_state(state)
}

#[cfg(test)]
mod tests;
