//! Chartwell Gatekeeper
//!
//! Validates assembled composites before they are persisted.
//!
//! The Gatekeeper checks:
//! - Required fields and identifiers (owner, correlation id)
//! - Count sanity (non-negative, consistent with totals)
//! - Range bounds for confidences and likelihoods
//! - Chronology of admission and discharge
//!
//! A rejection is surfaced as [`GatekeeperError::Rejected`], which callers
//! keep distinct from extraction failures.
//!
//! # Examples
//!
//! ```
//! use chartwell_domain::{ClinicalSummaryRecord, CorrelationId, RecordMetadata};
//! use chartwell_gatekeeper::{Gatekeeper, ValidationConfig};
//!
//! let mut metadata = RecordMetadata::new("P-1");
//! metadata.correlation_id = Some(CorrelationId::new());
//! let record = ClinicalSummaryRecord { summary: Default::default(), metadata };
//!
//! let gatekeeper = Gatekeeper::new(ValidationConfig::default());
//! assert!(gatekeeper.validate(&record).is_accepted());
//! ```

#![warn(missing_docs)]

mod validator;
mod error;
mod config;

pub use validator::{Gatekeeper, RejectionReason, Validatable, ValidationResult, ValidationStatus};
pub use error::GatekeeperError;
pub use config::ValidationConfig;
