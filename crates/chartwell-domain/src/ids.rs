//! Identifiers shared across records
//!
//! Both identifier types wrap a UUIDv7:
//! - Chronological sortability, so newer rows sort after older ones
//! - 128-bit uniqueness without coordination between concurrent requests
//! - Canonical 36-character hyphenated text form in storage

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when an identifier string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError(String);

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid identifier: {}", self.0)
    }
}

impl std::error::Error for IdParseError {}

/// Identifier shared by every record produced from one input document
///
/// Generated exactly once per request by the orchestration handler, before any
/// capability runs. Never reused across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use chartwell_domain::CorrelationId;
    ///
    /// let a = CorrelationId::new();
    /// let b = CorrelationId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID value
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IdParseError(format!("{s:?}: {e}")))
    }
}

/// Storage identity of a persisted record (table primary key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new UUIDv7-based record id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a record id from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0.as_u128()
    }

    /// Milliseconds since the Unix epoch encoded in the UUIDv7 prefix
    pub fn timestamp(&self) -> u64 {
        (self.value() >> 80) as u64
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IdParseError(format!("{s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_chronological() {
        let id1 = RecordId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = RecordId::new();

        assert!(id1 < id2, "Earlier UUIDv7 should be less than later UUIDv7");
        assert!(id1.timestamp() <= id2.timestamp());
    }

    #[test]
    fn test_correlation_id_display_and_parse() {
        let id = CorrelationId::new();
        let id_str = id.to_string();
        assert_eq!(id_str.len(), 36);

        let parsed: CorrelationId = id_str.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_invalid_strings_rejected() {
        assert!("not-a-valid-uuid".parse::<CorrelationId>().is_err());
        assert!("".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_correlation_id_serializes_as_plain_string() {
        let id = CorrelationId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
