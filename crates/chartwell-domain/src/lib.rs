//! Chartwell Domain Layer
//!
//! Core types shared by every other crate: identifiers, the extraction
//! request, the wrapper around a single capability's output, and the
//! composite records assembled from those outputs.
//!
//! ## Key Concepts
//!
//! - **CorrelationId**: generated once per request, carried by every record it produces
//! - **PartialResult**: one capability's typed output; identifiers are back-filled afterwards
//! - **Composite record**: the union of all partial results for one record kind
//! - **PersistedRecord**: a composite plus its storage identity
//!
//! This crate performs no I/O. Storage, model access and orchestration live
//! in other crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clinical;
pub mod hospital;
pub mod ids;
pub mod partial;
pub mod record;
pub mod request;

// Re-exports for convenience
pub use clinical::ClinicalSummaryRecord;
pub use hospital::HospitalSummaryRecord;
pub use ids::{CorrelationId, IdParseError, RecordId};
pub use partial::PartialResult;
pub use record::{Composite, CompositeRecord, PersistedRecord, RecordKind, RecordMetadata};
pub use request::{ExtractionRequest, RequestIssue, ENCOUNTER_ID_KEY};
