//! Domain aggregators
//!
//! One aggregator per record kind. Each fans out to the capabilities that
//! feed its record, joins on all of them, back-fills shared identifiers into
//! every partial result and assembles the composite. A composite is built
//! only when every capability succeeded.

mod clinical;
mod hospital;

pub use clinical::{ClinicalAggregator, ClinicalPartials};
pub use hospital::{HospitalAggregator, HospitalPartials};

use crate::ExtractorError;
use async_trait::async_trait;
use chartwell_domain::{Composite, ExtractionRequest, RecordKind};

/// Builds one record kind from one request
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Record kind produced
    fn record_kind(&self) -> RecordKind;

    /// Capabilities this aggregator invokes
    fn capabilities(&self) -> &'static [&'static str];

    /// Run every capability and assemble the composite
    async fn extract(&self, request: &ExtractionRequest) -> Result<Composite, ExtractorError>;
}
