// crates/pipeline-store-sqlite/src/lib.rs
// ============================================================================
// Module: Pipeline SQLite Store
// Description: SQLite-WAL-backed ArtifactStore implementation.
// Dependencies: pipeline-core, rusqlite, serde_json, thiserror
// ============================================================================

//! Durable [`pipeline_core::store::ArtifactStore`] backed by `SQLite` in WAL
//! mode. See [`store::SqliteArtifactStore`] for the implementation and its
//! grounding notes.

pub mod store;

pub use store::SqliteArtifactStore;
