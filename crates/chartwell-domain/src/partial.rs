//! Typed output of one capability invocation

use crate::CorrelationId;

/// A capability's typed result plus the shared identifiers an aggregator
/// back-fills after the invocation returns.
///
/// Identifiers start empty; capabilities never see them.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult<T> {
    /// Name of the capability that produced this result
    pub capability: String,
    /// Typed payload
    pub data: T,
    /// Owner identifier (back-filled)
    pub owner_id: Option<String>,
    /// Correlation identifier (back-filled)
    pub correlation_id: Option<CorrelationId>,
    /// Encounter identifier discovered during extraction (back-filled)
    pub encounter_id: Option<String>,
}

impl<T> PartialResult<T> {
    /// Wrap a freshly returned capability result
    pub fn new(capability: impl Into<String>, data: T) -> Self {
        Self {
            capability: capability.into(),
            data,
            owner_id: None,
            correlation_id: None,
            encounter_id: None,
        }
    }

    /// Fill in the shared identifiers
    pub fn backfill(
        &mut self,
        owner_id: &str,
        correlation_id: Option<CorrelationId>,
        encounter_id: Option<&str>,
    ) {
        self.owner_id = Some(owner_id.to_string());
        self.correlation_id = correlation_id;
        self.encounter_id = encounter_id.map(str::to_string);
    }

    /// Whether back-fill has happened
    pub fn is_backfilled(&self) -> bool {
        self.owner_id.is_some()
    }
}
