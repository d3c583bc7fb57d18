//! The per-document extraction request

use crate::CorrelationId;
use std::collections::BTreeMap;

/// Metadata key carrying an encounter identifier known ahead of extraction
pub const ENCOUNTER_ID_KEY: &str = "encounter_id";

/// One incoming document for one owner
///
/// Immutable once built; every aggregator reads the same request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    owner_id: String,
    text: String,
    metadata: BTreeMap<String, String>,
    correlation_id: Option<CorrelationId>,
}

/// Reasons a request is rejected before any capability runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIssue {
    /// Owner identifier is empty or whitespace
    MissingOwner,
    /// Document text is empty or whitespace
    EmptyText,
    /// Document text exceeds the configured limit
    TextTooLong {
        /// Length of the submitted text in bytes
        length: usize,
        /// Configured maximum
        max: usize,
    },
}

impl std::fmt::Display for RequestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestIssue::MissingOwner => write!(f, "owner_id is required and cannot be empty"),
            RequestIssue::EmptyText => write!(f, "text is required and cannot be empty"),
            RequestIssue::TextTooLong { length, max } => {
                write!(f, "text too long: {length} bytes (max: {max})")
            }
        }
    }
}

impl ExtractionRequest {
    /// Create a request with no metadata
    pub fn new(owner_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
            correlation_id: None,
        }
    }

    /// Attach caller-supplied metadata
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Stamp the correlation id the orchestration handler generated for this request
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Owner (e.g. patient) identifier
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Raw document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Caller-supplied metadata
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Correlation id, when the request came through the orchestration handler
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Encounter identifier supplied in metadata, if any
    pub fn known_encounter_id(&self) -> Option<&str> {
        self.metadata
            .get(ENCOUNTER_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// Check the request before extraction starts
    pub fn check(&self, max_text_length: usize) -> Result<(), RequestIssue> {
        if self.owner_id.trim().is_empty() {
            return Err(RequestIssue::MissingOwner);
        }
        if self.text.trim().is_empty() {
            return Err(RequestIssue::EmptyText);
        }
        if self.text.len() > max_text_length {
            return Err(RequestIssue::TextTooLong {
                length: self.text.len(),
                max: max_text_length,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_valid_request() {
        let request = ExtractionRequest::new("P-1", "Chief complaint: chest pain");
        assert!(request.check(1_000).is_ok());
    }

    #[test]
    fn test_check_rejects_blank_owner_and_text() {
        assert_eq!(
            ExtractionRequest::new("  ", "text").check(1_000),
            Err(RequestIssue::MissingOwner)
        );
        assert_eq!(
            ExtractionRequest::new("P-1", "\n\t").check(1_000),
            Err(RequestIssue::EmptyText)
        );
    }

    #[test]
    fn test_check_rejects_oversized_text() {
        let request = ExtractionRequest::new("P-1", "a".repeat(11));
        assert_eq!(
            request.check(10),
            Err(RequestIssue::TextTooLong { length: 11, max: 10 })
        );
    }

    #[test]
    fn test_known_encounter_id_ignores_blank_values() {
        let mut metadata = BTreeMap::new();
        metadata.insert(ENCOUNTER_ID_KEY.to_string(), " ".to_string());
        let request = ExtractionRequest::new("P-1", "text").with_metadata(metadata);
        assert_eq!(request.known_encounter_id(), None);

        let mut metadata = BTreeMap::new();
        metadata.insert(ENCOUNTER_ID_KEY.to_string(), "ENC-9".to_string());
        let request = ExtractionRequest::new("P-1", "text").with_metadata(metadata);
        assert_eq!(request.known_encounter_id(), Some("ENC-9"));
    }
}
