//! Composite records and their persisted form
//!
//! A composite is only ever built from a complete set of successful
//! capability results. The orchestration handler carries composites of
//! different kinds in a [`Composite`] until each one reaches its repository.

use crate::clinical::ClinicalSummaryRecord;
use crate::hospital::HospitalSummaryRecord;
use crate::{CorrelationId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// The record types this system produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Clinical summary entity
    ClinicalSummary,
    /// Hospital admission summary card
    HospitalSummary,
}

impl RecordKind {
    /// Every record kind
    pub const ALL: [RecordKind; 2] = [RecordKind::ClinicalSummary, RecordKind::HospitalSummary];

    /// Stable name used in logs and outcomes
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ClinicalSummary => "clinical_summary",
            RecordKind::HospitalSummary => "hospital_summary",
        }
    }

    /// Storage table holding records of this kind
    pub const fn table_name(&self) -> &'static str {
        match self {
            RecordKind::ClinicalSummary => "clinical_summaries",
            RecordKind::HospitalSummary => "hospital_summaries",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clinical" | "clinical_summary" | "clinical_summaries" => Ok(RecordKind::ClinicalSummary),
            "hospital" | "hospital_summary" | "hospital_summaries" => Ok(RecordKind::HospitalSummary),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// Metadata assembled alongside every composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Owner (e.g. patient) identifier
    pub owner_id: String,
    /// Shared correlation identifier, injected by the orchestration handler
    pub correlation_id: Option<CorrelationId>,
    /// Encounter identifier discovered during extraction
    pub encounter_id: Option<String>,
    /// Source document text
    pub raw_text: Option<String>,
    /// When the composite was assembled
    pub assembled_at: DateTime<Utc>,
    /// Model identity tag of the capabilities that produced it
    pub model_version: Option<String>,
    /// Optional overall confidence, 0.0 to 1.0
    pub confidence_score: Option<f64>,
}

impl RecordMetadata {
    /// Metadata stamped with the current time
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            correlation_id: None,
            encounter_id: None,
            raw_text: None,
            assembled_at: Utc::now(),
            model_version: None,
            confidence_score: None,
        }
    }
}

/// Behaviour shared by every composite record type
pub trait CompositeRecord:
    Clone + fmt::Debug + PartialEq + Serialize + serde::de::DeserializeOwned + Send + Sync + 'static
{
    /// Which record type this is
    const KIND: RecordKind;

    /// Version of the serialized payload shape; bump on incompatible change
    const SCHEMA_VERSION: u32;

    /// Assembly metadata
    fn metadata(&self) -> &RecordMetadata;

    /// Mutable assembly metadata
    fn metadata_mut(&mut self) -> &mut RecordMetadata;

    /// Wrap into the heterogeneous carrier
    fn into_composite(self) -> Composite;

    /// Summary fields reported back to the caller after persistence
    fn summary_fields(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Derived numeric value stored in a denormalized column, if any
    fn derived_value(&self) -> Option<i64> {
        None
    }

    /// Shared correlation identifier, once injected
    fn correlation_id(&self) -> Option<CorrelationId> {
        self.metadata().correlation_id
    }

    /// Overwrite the correlation identifier
    fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        self.metadata_mut().correlation_id = Some(correlation_id);
    }
}

impl CompositeRecord for ClinicalSummaryRecord {
    const KIND: RecordKind = RecordKind::ClinicalSummary;
    const SCHEMA_VERSION: u32 = 1;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn into_composite(self) -> Composite {
        Composite::Clinical(Box::new(self))
    }

    fn summary_fields(&self) -> Map<String, Value> {
        let labs = &self.summary.lab_summary;
        let mut fields = Map::new();
        fields.insert(
            "primary_diagnosis".to_string(),
            json!(self.summary.clinical_assessment.primary_diagnosis),
        );
        fields.insert("total_tests".to_string(), json!(labs.total_tests));
        fields.insert("critical_count".to_string(), json!(labs.critical_count));
        fields
    }
}

impl CompositeRecord for HospitalSummaryRecord {
    const KIND: RecordKind = RecordKind::HospitalSummary;
    const SCHEMA_VERSION: u32 = 1;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn into_composite(self) -> Composite {
        Composite::Hospital(Box::new(self))
    }

    fn summary_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "length_of_stay_days".to_string(),
            json!(self.length_of_stay_days()),
        );
        fields.insert(
            "risk_level".to_string(),
            json!(self.medication_risk_assessment.risk_level),
        );
        fields
    }

    fn derived_value(&self) -> Option<i64> {
        Some(self.length_of_stay_days())
    }
}

/// One assembled composite of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    /// Clinical summary composite
    Clinical(Box<ClinicalSummaryRecord>),
    /// Hospital admission summary composite
    Hospital(Box<HospitalSummaryRecord>),
}

impl Composite {
    /// Record kind of the wrapped composite
    pub fn kind(&self) -> RecordKind {
        match self {
            Composite::Clinical(_) => RecordKind::ClinicalSummary,
            Composite::Hospital(_) => RecordKind::HospitalSummary,
        }
    }

    /// Assembly metadata of the wrapped composite
    pub fn metadata(&self) -> &RecordMetadata {
        match self {
            Composite::Clinical(record) => record.metadata(),
            Composite::Hospital(record) => record.metadata(),
        }
    }

    /// Owner identifier recorded at assembly
    pub fn owner_id(&self) -> &str {
        &self.metadata().owner_id
    }

    /// Correlation identifier, once injected
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.metadata().correlation_id
    }

    /// Overwrite the correlation identifier of the wrapped composite
    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        match self {
            Composite::Clinical(record) => record.set_correlation_id(correlation_id),
            Composite::Hospital(record) => record.set_correlation_id(correlation_id),
        }
    }

    /// Summary fields of the wrapped composite
    pub fn summary_fields(&self) -> Map<String, Value> {
        match self {
            Composite::Clinical(record) => record.summary_fields(),
            Composite::Hospital(record) => record.summary_fields(),
        }
    }
}

/// A composite plus its storage identity
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord<R> {
    /// Row primary key
    pub id: RecordId,
    /// Owner identifier
    pub owner_id: String,
    /// Correlation identifier shared with sibling records
    pub correlation_id: CorrelationId,
    /// When the row was first written
    pub created_at: DateTime<Utc>,
    /// The stored composite
    pub record: R,
}
