//! Typed composite <-> JSON payload column
//!
//! Every stored payload is wrapped in an envelope naming the schema and its
//! version:
//!
//! ```json
//! {"schema": "hospital_summaries", "version": 1, "data": { ... }}
//! ```
//!
//! Decoding checks both before touching `data`, so a payload written by an
//! incompatible build fails loudly instead of decoding into the wrong shape.

use crate::StoreError;
use chartwell_domain::{ClinicalSummaryRecord, CompositeRecord, HospitalSummaryRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    schema: &'a str,
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    schema: String,
    version: u32,
    data: serde_json::Value,
}

/// Binding between a payload column and the type stored in it
pub struct PayloadColumn<T> {
    schema: &'static str,
    version: u32,
    _type: PhantomData<fn() -> T>,
}

impl<T> PayloadColumn<T> {
    /// Bind a schema name and version to `T`
    pub const fn new(schema: &'static str, version: u32) -> Self {
        Self {
            schema,
            version,
            _type: PhantomData,
        }
    }

    /// Schema name written into every envelope
    pub fn schema(&self) -> &'static str {
        self.schema
    }

    /// Schema version written into every envelope
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl<T: Serialize + DeserializeOwned> PayloadColumn<T> {
    /// Serialize `value` into an envelope document
    pub fn encode(&self, value: &T) -> Result<String, StoreError> {
        let envelope = EnvelopeOut {
            schema: self.schema,
            version: self.version,
            data: value,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Reconstitute a value from an envelope document
    pub fn decode(&self, document: &str) -> Result<T, StoreError> {
        let envelope: EnvelopeIn = serde_json::from_str(document)?;
        if envelope.schema != self.schema || envelope.version != self.version {
            return Err(StoreError::SchemaMismatch {
                expected: format!("{}@v{}", self.schema, self.version),
                found: format!("{}@v{}", envelope.schema, envelope.version),
            });
        }
        Ok(serde_json::from_value(envelope.data)?)
    }
}

/// A composite that has a table and a payload binding
pub trait StoredRecord: CompositeRecord {
    /// Table holding this record type
    const TABLE: &'static str;

    /// Payload column binding
    const PAYLOAD: PayloadColumn<Self>;

    /// Denormalized column filled from [`CompositeRecord::derived_value`]
    const DERIVED_COLUMN: Option<&'static str> = None;
}

impl StoredRecord for ClinicalSummaryRecord {
    const TABLE: &'static str = Self::KIND.table_name();
    const PAYLOAD: PayloadColumn<Self> = PayloadColumn::new(Self::TABLE, Self::SCHEMA_VERSION);
}

impl StoredRecord for HospitalSummaryRecord {
    const TABLE: &'static str = Self::KIND.table_name();
    const PAYLOAD: PayloadColumn<Self> = PayloadColumn::new(Self::TABLE, Self::SCHEMA_VERSION);
    const DERIVED_COLUMN: Option<&'static str> = Some("length_of_stay_days");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_domain::RecordMetadata;
    use serde_json::json;

    fn hospital() -> HospitalSummaryRecord {
        serde_json::from_value(json!({
            "facility": {"facility_name": "St. Mary", "facility_type": "acute_care"},
            "timing": {"admission_date": "2024-03-01", "discharge_date": "2024-03-06"},
            "diagnosis": {"primary_diagnosis": "Hyponatremia"},
            "medication_risk_assessment": {"risk_level": "high", "confidence_score": 0.85},
            "metadata": RecordMetadata::new("P-1"),
        }))
        .unwrap()
    }

    #[test]
    fn test_envelope_shape() {
        let document = HospitalSummaryRecord::PAYLOAD.encode(&hospital()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&document).unwrap();

        assert_eq!(value["schema"], "hospital_summaries");
        assert_eq!(value["version"], 1);
        assert_eq!(value["data"]["diagnosis"]["primary_diagnosis"], "Hyponatremia");
    }

    #[test]
    fn test_round_trip() {
        let record = hospital();
        let column = &HospitalSummaryRecord::PAYLOAD;
        let decoded = column.decode(&column.encode(&record).unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_rejects_other_schema() {
        let document = HospitalSummaryRecord::PAYLOAD.encode(&hospital()).unwrap();
        let result = ClinicalSummaryRecord::PAYLOAD.decode(&document);
        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let record = hospital();
        let newer: PayloadColumn<HospitalSummaryRecord> =
            PayloadColumn::new("hospital_summaries", 2);
        let document = newer.encode(&record).unwrap();

        match HospitalSummaryRecord::PAYLOAD.decode(&document) {
            Err(StoreError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, "hospital_summaries@v1");
                assert_eq!(found, "hospital_summaries@v2");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_bare_payload() {
        let bare = serde_json::to_string(&hospital()).unwrap();
        let result = HospitalSummaryRecord::PAYLOAD.decode(&bare);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
