// crates/pipeline-core/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Validated newtypes for run, job, step, and artifact names.
// ============================================================================

//! All identifiers that cross a trust boundary (HTTP request, CLI argument,
//! job queue payload) are validated on construction and rejected outright if
//! they could be used for path traversal or SQL injection downstream.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Errors raised when constructing a validated identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The run id did not match `^[a-f0-9-]{8,36}$`.
    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),
    /// The artifact name did not match `^[A-Za-z0-9_-]+$`.
    #[error("invalid artifact name: {0:?}")]
    InvalidArtifactName(String),
    /// The step name did not match `^[A-Za-z0-9_-]+$`.
    #[error("invalid step name: {0:?}")]
    InvalidStepName(String),
}

fn is_hex_or_dash(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '-'
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// A validated run identifier.
///
/// # Invariants
/// - Matches `^[a-f0-9-]{8,36}$`; never contains path separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Validates and wraps a raw run id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidRunId`] when `raw` does not match
    /// `^[a-f0-9-]{8,36}$`.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        let len_ok = (8..=36).contains(&raw.chars().count());
        if len_ok && !raw.is_empty() && raw.chars().all(is_hex_or_dash) {
            Ok(Self(raw))
        } else {
            Err(IdentifierError::InvalidRunId(raw))
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(value: RunId) -> Self {
        value.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated artifact name.
///
/// # Invariants
/// - Matches `^[A-Za-z0-9_-]+$`; never contains path separators or dots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Validates and wraps a raw artifact name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidArtifactName`] when `raw` is empty
    /// or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if !raw.is_empty() && raw.chars().all(is_token_char) {
            Ok(Self(raw))
        } else {
            Err(IdentifierError::InvalidArtifactName(raw))
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactName> for String {
    fn from(value: ArtifactName) -> Self {
        value.0
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated step name, matching the same token grammar as artifact names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepName(String);

impl StepName {
    /// Validates and wraps a raw step name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidStepName`] when `raw` is empty or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if !raw.is_empty() && raw.chars().all(is_token_char) {
            Ok(Self(raw))
        } else {
            Err(IdentifierError::InvalidStepName(raw))
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StepName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StepName> for String {
    fn from(value: StepName) -> Self {
        value.0
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque job identifier, sharing the run id's grammar (the original
/// implementation uses the run id as the job's primary key).
pub type JobId = RunId;

#[cfg(test)]
mod tests {
    use super::ArtifactName;
    use super::RunId;

    #[test]
    fn rejects_path_traversal_run_id() {
        assert!(RunId::new("../../etc/passwd").is_err());
    }

    #[test]
    fn accepts_uuid_like_run_id() {
        assert!(RunId::new("a1b2c3d4-e5f6-4789-a012-3456789abcde").is_ok());
    }

    #[test]
    fn rejects_short_run_id() {
        assert!(RunId::new("a1b2").is_err());
    }

    #[test]
    fn rejects_dotted_artifact_name() {
        assert!(ArtifactName::new("../secret").is_err());
        assert!(ArtifactName::new("report.json").is_err());
    }

    #[test]
    fn accepts_token_artifact_name() {
        assert!(ArtifactName::new("correlation_analysis").is_ok());
    }
}
