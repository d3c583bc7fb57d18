//! Error types for the Extractor

use chartwell_domain::{RecordKind, RequestIssue};
use chartwell_gatekeeper::GatekeeperError;
use chartwell_llm::LlmError;
use chartwell_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single capability attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// Remote model or service failure
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Attempt exceeded its per-attempt timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Output was not the declared structure
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// Input the capability cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Programmer or configuration error
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl CapabilityError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::Timeout(_) | Self::InvalidOutput(_)
        )
    }
}

impl From<LlmError> for CapabilityError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::InvalidResponse(message) => Self::InvalidOutput(message),
            transient if transient.is_transient() => Self::Transient(transient.to_string()),
            other => Self::Fatal(other.to_string()),
        }
    }
}

/// A capability that failed for good
#[derive(Error, Debug, Clone, PartialEq)]
#[error("capability '{capability}' failed after {attempts} attempt(s): {last_error}")]
pub struct ExtractionFailure {
    /// Name of the failing capability
    pub capability: String,
    /// Attempts made, at most `max_retries + 1`
    pub attempts: u32,
    /// Error of the final attempt
    pub last_error: CapabilityError,
}

/// Errors that can occur while processing a document
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// A capability feeding this record kind failed
    #[error("{record} extraction failed: {failure}")]
    Extraction {
        /// Record kind whose aggregator failed
        record: RecordKind,
        /// The capability failure
        #[source]
        failure: ExtractionFailure,
    },

    /// An assembled composite broke a validation rule
    #[error("Validation failed: {0}")]
    Validation(#[from] GatekeeperError),

    /// Storage failed for infrastructural reasons
    #[error("Persisting {record} failed: {source}")]
    Persistence {
        /// Record kind being written
        record: RecordKind,
        /// Underlying storage error
        #[source]
        source: StoreError,
    },

    /// A uniqueness constraint was violated
    #[error("Duplicate {record}: {source}")]
    Duplicate {
        /// Record kind being written
        record: RecordKind,
        /// Underlying storage error
        #[source]
        source: StoreError,
    },

    /// Request rejected before extraction started
    #[error("Invalid request: {0}")]
    InvalidRequest(RequestIssue),

    /// A required capability is not registered
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A spawned task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}

impl ExtractorError {
    /// Classify a storage error raised while writing `record`
    pub fn from_store(record: RecordKind, source: StoreError) -> Self {
        if source.is_duplicate() {
            Self::Duplicate { record, source }
        } else {
            Self::Persistence { record, source }
        }
    }

    /// Name of the capability behind an extraction failure
    pub fn failed_capability(&self) -> Option<&str> {
        match self {
            Self::Extraction { failure, .. } => Some(&failure.capability),
            _ => None,
        }
    }

    /// Whether this is a uniqueness violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<RequestIssue> for ExtractorError {
    fn from(issue: RequestIssue) -> Self {
        Self::InvalidRequest(issue)
    }
}
