//! Gatekeeper error types

use crate::RejectionReason;
use thiserror::Error;

/// Errors that can occur during gatekeeper operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatekeeperError {
    /// A composite failed one or more rules
    #[error("{record} rejected: {}", format_reasons(.reasons))]
    Rejected {
        /// Record kind that was rejected
        record: String,
        /// Every rule the composite broke
        reasons: Vec<RejectionReason>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_reasons(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
