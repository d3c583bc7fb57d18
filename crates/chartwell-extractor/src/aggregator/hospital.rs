//! Hospital admission summary aggregator

use super::Aggregator;
use crate::catalog::names;
use crate::{CapabilityInvoker, ExtractionFailure, ExtractorError};
use async_trait::async_trait;
use chartwell_domain::hospital::{DiagnosisOutput, FacilityTimingOutput, MedicationRiskOutput};
use chartwell_domain::{
    Composite, CompositeRecord, ExtractionRequest, HospitalSummaryRecord, PartialResult,
    RecordKind, RecordMetadata,
};
use chrono::Utc;
use tracing::{debug, info, warn};

const CAPABILITIES: &[&str] = &[
    names::FACILITY_TIMING,
    names::DIAGNOSIS,
    names::MEDICATION_RISK,
];

/// Stays longer than this are kept but flagged in the log
const LONG_STAY_DAYS: i64 = 365;

fn is_unusually_long_stay(days: i64) -> bool {
    days > LONG_STAY_DAYS
}

fn extraction_failed(failure: ExtractionFailure) -> ExtractorError {
    ExtractorError::Extraction {
        record: RecordKind::HospitalSummary,
        failure,
    }
}

/// Every partial result feeding one hospital admission summary
#[derive(Debug, Clone, PartialEq)]
pub struct HospitalPartials {
    /// Output of the `facility_timing` capability
    pub facility_timing: PartialResult<FacilityTimingOutput>,
    /// Output of the `diagnosis` capability
    pub diagnosis: PartialResult<DiagnosisOutput>,
    /// Output of the `medication_risk` capability
    pub medication_risk: PartialResult<MedicationRiskOutput>,
    /// Encounter identifier shared by all of them
    pub encounter_id: Option<String>,
}

/// Builds [`HospitalSummaryRecord`]s from three capabilities
///
/// `facility_timing` discovers the encounter identifier, so unless the
/// request already carries one it runs to completion before the other two
/// start.
#[derive(Debug, Clone)]
pub struct HospitalAggregator {
    invoker: CapabilityInvoker,
}

impl HospitalAggregator {
    /// Create the aggregator, failing if a capability is missing
    pub fn new(invoker: CapabilityInvoker) -> Result<Self, ExtractorError> {
        invoker.registry().ensure_registered(CAPABILITIES)?;
        Ok(Self { invoker })
    }

    /// Run the capabilities and back-fill identifiers
    pub async fn gather(&self, request: &ExtractionRequest) -> Result<HospitalPartials, ExtractorError> {
        let text = request.text();
        let invoker = &self.invoker;

        let (facility_timing, diagnosis, medication_risk) = match request.known_encounter_id() {
            Some(_) => {
                let (facility_timing, diagnosis, medication_risk) = tokio::join!(
                    invoker.run::<FacilityTimingOutput>(names::FACILITY_TIMING, text),
                    invoker.run::<DiagnosisOutput>(names::DIAGNOSIS, text),
                    invoker.run::<MedicationRiskOutput>(names::MEDICATION_RISK, text),
                );
                (
                    facility_timing.map_err(extraction_failed)?,
                    diagnosis.map_err(extraction_failed)?,
                    medication_risk.map_err(extraction_failed)?,
                )
            }
            None => {
                let facility_timing = invoker
                    .run::<FacilityTimingOutput>(names::FACILITY_TIMING, text)
                    .await
                    .map_err(extraction_failed)?;
                debug!(
                    encounter_id = facility_timing.data.encounter_id.as_deref().unwrap_or("-"),
                    "Encounter identifier discovered"
                );
                let (diagnosis, medication_risk) = tokio::join!(
                    invoker.run::<DiagnosisOutput>(names::DIAGNOSIS, text),
                    invoker.run::<MedicationRiskOutput>(names::MEDICATION_RISK, text),
                );
                (
                    facility_timing,
                    diagnosis.map_err(extraction_failed)?,
                    medication_risk.map_err(extraction_failed)?,
                )
            }
        };

        let encounter_id = request
            .known_encounter_id()
            .map(str::to_string)
            .or_else(|| facility_timing.data.encounter_id.clone())
            .filter(|id| !id.trim().is_empty());

        let mut partials = HospitalPartials {
            facility_timing,
            diagnosis,
            medication_risk,
            encounter_id,
        };

        let owner_id = request.owner_id();
        let correlation_id = request.correlation_id();
        let encounter_id = partials.encounter_id.as_deref();
        partials.facility_timing.backfill(owner_id, correlation_id, encounter_id);
        partials.diagnosis.backfill(owner_id, correlation_id, encounter_id);
        partials.medication_risk.backfill(owner_id, correlation_id, encounter_id);

        Ok(partials)
    }

    /// Stitch the partials into one record
    ///
    /// `assessed_at` is stamped with the assembly time when the capability
    /// omitted it. Length of stay is derived from the timing on demand.
    pub fn assemble(&self, partials: HospitalPartials, request: &ExtractionRequest) -> HospitalSummaryRecord {
        let now = Utc::now();
        let mut risk = partials.medication_risk.data.medication_risk_assessment;
        risk.ensure_assessed_at(now);

        let metadata = RecordMetadata {
            owner_id: request.owner_id().to_string(),
            correlation_id: request.correlation_id(),
            encounter_id: partials.encounter_id,
            raw_text: Some(request.text().to_string()),
            assembled_at: now,
            model_version: self.invoker.model_version(names::MEDICATION_RISK),
            confidence_score: Some(risk.confidence_score),
        };

        let record = HospitalSummaryRecord {
            facility: partials.facility_timing.data.facility,
            timing: partials.facility_timing.data.timing,
            diagnosis: partials.diagnosis.data.diagnosis,
            medication_risk_assessment: risk,
            metadata,
        };

        let days = record.length_of_stay_days();
        if is_unusually_long_stay(days) {
            warn!(
                owner_id = request.owner_id(),
                admission_date = %record.timing.admission_date,
                discharge_date = %record.timing.discharge_date,
                length_of_stay_days = days,
                "Unusually long stay"
            );
        }
        record
    }
}

#[async_trait]
impl Aggregator for HospitalAggregator {
    fn record_kind(&self) -> RecordKind {
        RecordKind::HospitalSummary
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<Composite, ExtractorError> {
        debug!(owner_id = request.owner_id(), "Extracting hospital summary");
        let partials = self.gather(request).await?;
        let record = self.assemble(partials, request);
        info!(
            owner_id = request.owner_id(),
            encounter_id = record.metadata.encounter_id.as_deref().unwrap_or("-"),
            length_of_stay_days = record.length_of_stay_days(),
            risk_level = %record.medication_risk_assessment.risk_level,
            "Assembled hospital summary"
        );
        Ok(record.into_composite())
    }
}
