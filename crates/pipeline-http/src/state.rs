// crates/pipeline-http/src/state.rs
// ============================================================================
// Module: App state
// Description: The shared handles every handler needs (spec.md §6's
//              "consumes two external services").
// ============================================================================

use std::sync::Arc;

use pipeline_core::store::ArtifactStore;
use pipeline_queue::JobQueue;

/// Cloneable handle to the Job Queue and Artifact Store, injected into every
/// axum handler via `State`.
#[derive(Clone)]
pub struct AppState {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ArtifactStore>,
}

impl AppState {
    /// Builds app state from the two backends the HTTP surface consumes.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { queue, store }
    }

    /// Returns the Job Queue handle.
    #[must_use]
    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    /// Returns the Artifact Store handle.
    #[must_use]
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }
}
