// crates/pipeline-core/src/time.rs
// ============================================================================
// Module: Timestamp
// ============================================================================

//! Thin wrapper around [`time::OffsetDateTime`] giving the domain model a
//! single, serde-friendly timestamp type.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC instant, serialized as an RFC 3339 string.
///
/// # Invariants
/// - Always UTC; no local-offset ambiguity is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Returns the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Returns the number of whole seconds elapsed since `self`.
    #[must_use]
    pub fn elapsed_seconds_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_seconds()
    }

    /// Wraps a raw [`OffsetDateTime`].
    #[must_use]
    pub fn from_offset_date_time(dt: OffsetDateTime) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`OffsetDateTime`].
    #[must_use]
    pub fn into_offset_date_time(self) -> OffsetDateTime {
        self.0
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let text = self
            .0
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let parsed = OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)?;
        Ok(Self(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn round_trips_through_json() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).expect("serialize");
        let back: Timestamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ts, back);
    }

    #[test]
    fn elapsed_seconds_is_nonnegative_forward() {
        let earlier = Timestamp::now();
        let later = Timestamp::now();
        assert!(later.elapsed_seconds_since(earlier) >= 0);
    }
}
