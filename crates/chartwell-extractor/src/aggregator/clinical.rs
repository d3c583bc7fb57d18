//! Clinical summary aggregator

use super::Aggregator;
use crate::catalog::names;
use crate::{CapabilityInvoker, ExtractionFailure, ExtractorError};
use async_trait::async_trait;
use chartwell_domain::clinical::{
    AssessmentOutput, ClinicalSummary, CourseOutput, FindingsOutput, FollowUpOutput,
    HistoryOutput, LabsOutput, PresentationOutput, TreatmentsOutput,
};
use chartwell_domain::{
    ClinicalSummaryRecord, Composite, CompositeRecord, CorrelationId, ExtractionRequest,
    PartialResult, RecordKind, RecordMetadata,
};
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

const CAPABILITIES: &[&str] = &[
    names::PRESENTATION,
    names::HISTORY,
    names::FINDINGS,
    names::ASSESSMENT,
    names::COURSE,
    names::FOLLOW_UP,
    names::TREATMENTS,
    names::LABS,
];

static DOC_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)DOC_ID:([a-f0-9-]+)").expect("DOC_ID pattern must compile")
});

static ENCOUNTER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Encounter ID[:\s]+(\S+)").expect("Encounter ID pattern must compile")
});

/// Encounter identifier from request metadata, else from labels in the text
pub fn discover_encounter_id(request: &ExtractionRequest) -> Option<String> {
    if let Some(known) = request.known_encounter_id() {
        return Some(known.to_string());
    }
    [&*DOC_ID, &*ENCOUNTER_ID].iter().find_map(|pattern| {
        pattern
            .captures(request.text())
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

fn extraction_failed(failure: ExtractionFailure) -> ExtractorError {
    ExtractorError::Extraction {
        record: RecordKind::ClinicalSummary,
        failure,
    }
}

/// Every partial result feeding one clinical summary
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalPartials {
    /// Output of the `presentation` capability
    pub presentation: PartialResult<PresentationOutput>,
    /// Output of the `history` capability
    pub history: PartialResult<HistoryOutput>,
    /// Output of the `findings` capability
    pub findings: PartialResult<FindingsOutput>,
    /// Output of the `assessment` capability
    pub assessment: PartialResult<AssessmentOutput>,
    /// Output of the `course` capability
    pub course: PartialResult<CourseOutput>,
    /// Output of the `follow_up` capability
    pub follow_up: PartialResult<FollowUpOutput>,
    /// Output of the `treatments` capability
    pub treatments: PartialResult<TreatmentsOutput>,
    /// Output of the `labs` capability
    pub labs: PartialResult<LabsOutput>,
    /// Encounter identifier shared by all of them
    pub encounter_id: Option<String>,
}

impl ClinicalPartials {
    fn backfill(
        &mut self,
        owner_id: &str,
        correlation_id: Option<CorrelationId>,
        encounter_id: Option<&str>,
    ) {
        self.presentation.backfill(owner_id, correlation_id, encounter_id);
        self.history.backfill(owner_id, correlation_id, encounter_id);
        self.findings.backfill(owner_id, correlation_id, encounter_id);
        self.assessment.backfill(owner_id, correlation_id, encounter_id);
        self.course.backfill(owner_id, correlation_id, encounter_id);
        self.follow_up.backfill(owner_id, correlation_id, encounter_id);
        self.treatments.backfill(owner_id, correlation_id, encounter_id);
        self.labs.backfill(owner_id, correlation_id, encounter_id);
    }
}

/// Builds [`ClinicalSummaryRecord`]s from eight section capabilities
#[derive(Debug, Clone)]
pub struct ClinicalAggregator {
    invoker: CapabilityInvoker,
}

impl ClinicalAggregator {
    /// Create the aggregator, failing if a section capability is missing
    pub fn new(invoker: CapabilityInvoker) -> Result<Self, ExtractorError> {
        invoker.registry().ensure_registered(CAPABILITIES)?;
        Ok(Self { invoker })
    }

    /// Run all section capabilities concurrently and back-fill identifiers
    ///
    /// The encounter id needs no capability here, so everything fans out at
    /// once. Fails as a whole if any capability fails.
    pub async fn gather(&self, request: &ExtractionRequest) -> Result<ClinicalPartials, ExtractorError> {
        let encounter_id = discover_encounter_id(request);
        let text = request.text();
        let invoker = &self.invoker;

        let (presentation, history, findings, assessment, course, follow_up, treatments, labs) = tokio::join!(
            invoker.run::<PresentationOutput>(names::PRESENTATION, text),
            invoker.run::<HistoryOutput>(names::HISTORY, text),
            invoker.run::<FindingsOutput>(names::FINDINGS, text),
            invoker.run::<AssessmentOutput>(names::ASSESSMENT, text),
            invoker.run::<CourseOutput>(names::COURSE, text),
            invoker.run::<FollowUpOutput>(names::FOLLOW_UP, text),
            invoker.run::<TreatmentsOutput>(names::TREATMENTS, text),
            invoker.run::<LabsOutput>(names::LABS, text),
        );

        let mut partials = ClinicalPartials {
            presentation: presentation.map_err(extraction_failed)?,
            history: history.map_err(extraction_failed)?,
            findings: findings.map_err(extraction_failed)?,
            assessment: assessment.map_err(extraction_failed)?,
            course: course.map_err(extraction_failed)?,
            follow_up: follow_up.map_err(extraction_failed)?,
            treatments: treatments.map_err(extraction_failed)?,
            labs: labs.map_err(extraction_failed)?,
            encounter_id,
        };

        let encounter_id = partials.encounter_id.clone();
        partials.backfill(
            request.owner_id(),
            request.correlation_id(),
            encounter_id.as_deref(),
        );
        Ok(partials)
    }

    /// Stitch the partials into one record
    ///
    /// Lab counts are computed from the lab list only when the labs
    /// capability left them empty.
    pub fn assemble(&self, partials: ClinicalPartials, request: &ExtractionRequest) -> ClinicalSummaryRecord {
        let labs = partials.labs.data;
        let lab_summary = labs.lab_summary.or_computed_from(&labs.lab_results);

        let summary = ClinicalSummary {
            patient_presentation: partials.presentation.data.patient_presentation,
            relevant_history: partials.history.data.relevant_history,
            clinical_findings: partials.findings.data.clinical_findings,
            clinical_assessment: partials.assessment.data.clinical_assessment,
            hospital_course: partials.course.data.hospital_course,
            follow_up_plan: partials.follow_up.data.follow_up_plan,
            treatments_procedures: partials.treatments.data.treatments_procedures,
            lab_results: labs.lab_results,
            lab_summary,
        };

        let metadata = RecordMetadata {
            owner_id: request.owner_id().to_string(),
            correlation_id: request.correlation_id(),
            encounter_id: partials.encounter_id,
            raw_text: Some(request.text().to_string()),
            assembled_at: Utc::now(),
            model_version: self.invoker.model_version(names::ASSESSMENT),
            confidence_score: None,
        };

        ClinicalSummaryRecord { summary, metadata }
    }
}

#[async_trait]
impl Aggregator for ClinicalAggregator {
    fn record_kind(&self) -> RecordKind {
        RecordKind::ClinicalSummary
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<Composite, ExtractorError> {
        debug!(owner_id = request.owner_id(), "Extracting clinical summary");
        let partials = self.gather(request).await?;
        let record = self.assemble(partials, request);
        info!(
            owner_id = request.owner_id(),
            encounter_id = record.metadata.encounter_id.as_deref().unwrap_or("-"),
            lab_tests = record.summary.lab_summary.total_tests,
            "Assembled clinical summary"
        );
        Ok(record.into_composite())
    }
}
