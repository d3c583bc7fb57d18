//! The production capability set
//!
//! Eight capabilities feed the clinical summary, three feed the hospital
//! admission summary. All of them are [`LlmCapability`] instances sharing one
//! provider.

use crate::{CapabilityRegistry, LlmCapability};
use chartwell_domain::RecordKind;
use chartwell_llm::LlmProvider;
use std::sync::Arc;

/// Capability names
pub mod names {
    /// Presenting symptoms and how the patient arrived
    pub const PRESENTATION: &str = "presentation";
    /// Relevant past medical history
    pub const HISTORY: &str = "history";
    /// Vitals, exam and imaging findings
    pub const FINDINGS: &str = "findings";
    /// Diagnoses and clinical reasoning
    pub const ASSESSMENT: &str = "assessment";
    /// Hospital course timeline
    pub const COURSE: &str = "course";
    /// Follow-up plan and discharge instructions
    pub const FOLLOW_UP: &str = "follow_up";
    /// Treatments and procedures
    pub const TREATMENTS: &str = "treatments";
    /// Lab results and counts
    pub const LABS: &str = "labs";
    /// Facility, admission/discharge timing and the encounter identifier
    pub const FACILITY_TIMING: &str = "facility_timing";
    /// Admission diagnoses
    pub const DIAGNOSIS: &str = "diagnosis";
    /// Medication-related risk assessment
    pub const MEDICATION_RISK: &str = "medication_risk";
}

/// Static description of one catalog capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDefinition {
    /// Registry key
    pub name: &'static str,
    /// Record kind it feeds
    pub record_kind: RecordKind,
    /// Output schema tag
    pub output_schema: &'static str,
    /// Instruction text sent as part of the system prompt
    pub instructions: &'static str,
}

impl CapabilityDefinition {
    /// Build the capability against `provider`
    pub fn build(&self, provider: Arc<dyn LlmProvider>, model: Option<String>) -> LlmCapability {
        LlmCapability::new(
            self.name,
            self.record_kind,
            self.output_schema,
            self.instructions,
            provider,
        )
        .with_model(model)
    }
}

/// Every catalog capability
pub const CATALOG: [CapabilityDefinition; 11] = [
    CapabilityDefinition {
        name: names::PRESENTATION,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.presentation.v1",
        instructions: PRESENTATION_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::HISTORY,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.history.v1",
        instructions: HISTORY_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::FINDINGS,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.findings.v1",
        instructions: FINDINGS_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::ASSESSMENT,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.assessment.v1",
        instructions: ASSESSMENT_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::COURSE,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.course.v1",
        instructions: COURSE_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::FOLLOW_UP,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.follow_up.v1",
        instructions: FOLLOW_UP_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::TREATMENTS,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.treatments.v1",
        instructions: TREATMENTS_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::LABS,
        record_kind: RecordKind::ClinicalSummary,
        output_schema: "clinical.labs.v1",
        instructions: LABS_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::FACILITY_TIMING,
        record_kind: RecordKind::HospitalSummary,
        output_schema: "hospital.facility_timing.v1",
        instructions: FACILITY_TIMING_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::DIAGNOSIS,
        record_kind: RecordKind::HospitalSummary,
        output_schema: "hospital.diagnosis.v1",
        instructions: DIAGNOSIS_INSTRUCTIONS,
    },
    CapabilityDefinition {
        name: names::MEDICATION_RISK,
        record_kind: RecordKind::HospitalSummary,
        output_schema: "hospital.medication_risk.v1",
        instructions: MEDICATION_RISK_INSTRUCTIONS,
    },
];

/// Register every catalog capability against one provider
///
/// Returns the number of capabilities registered.
pub fn register_all(
    registry: &CapabilityRegistry,
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
) -> usize {
    for definition in &CATALOG {
        registry.register(Arc::new(
            definition.build(Arc::clone(&provider), model.clone()),
        ));
    }
    tracing::info!(count = CATALOG.len(), "Registered capability catalog");
    CATALOG.len()
}

const PRESENTATION_INSTRUCTIONS: &str = r#"Extract how the patient presented.
Return:
{"patient_presentation": {
  "symptoms": ["..."],
  "symptom_source": "patient | family | EMS | other or null",
  "presentation_method": "how the patient arrived, or null",
  "presentation_details": "short narrative or null",
  "presentation_timeline": "onset and duration, or null",
  "severity_indicators": ["..."]
}}"#;

const HISTORY_INSTRUCTIONS: &str = r#"Extract the medical history relevant to this visit.
Return:
{"relevant_history": {"conditions": [
  {"condition_name": "...", "icd10_code": "code or null", "severity": "... or null",
   "status": "active | resolved | chronic or null", "notes": "... or null",
   "documented_in_section": "section heading or null"}
]}}"#;

const FINDINGS_INSTRUCTIONS: &str = r#"Extract objective findings.
Return:
{"clinical_findings": {
  "vital_signs": [{"measurement": "...", "value": number or text, "unit": "... or null", "status": "... or null"}],
  "physical_exam_findings": [{"system": "...", "finding": "...", "status": "... or null"}],
  "imaging_findings": [{"study": "...", "date": "YYYY-MM-DD or null", "findings": ["..."], "impression": "... or null"}]
}}"#;

const ASSESSMENT_INSTRUCTIONS: &str = r#"Extract the clinical assessment.
Return:
{"clinical_assessment": {
  "primary_diagnosis": "...",
  "primary_diagnosis_source": "section it was stated in, or null",
  "secondary_diagnoses": ["..."],
  "clinical_reasoning": ["..."],
  "implicated_medications": ["..."],
  "fall_risk_level": "high | moderate | low or null"
}}"#;

const COURSE_INSTRUCTIONS: &str = r#"Extract the hospital course in time order.
Return:
{"hospital_course": {
  "timeline": [{"event": "...", "time": "... or null", "details": "... or null"}],
  "narrative_summary": "... or null",
  "disposition": "... or null",
  "admission_date": "YYYY-MM-DD or null",
  "discharge_date": "YYYY-MM-DD or null"
}}"#;

const FOLLOW_UP_INSTRUCTIONS: &str = r#"Extract the follow-up plan.
Return:
{"follow_up_plan": {
  "appointments": [{"specialty": "...", "urgency": "... or null", "timeframe": "... or null", "provider": "... or null"}],
  "discharge_instructions": ["..."],
  "recommendations": ["..."],
  "patient_education": ["..."]
}}"#;

const TREATMENTS_INSTRUCTIONS: &str = r#"Extract every treatment and procedure performed.
Return:
{"treatments_procedures": [
  {"id": "t1", "treatment_type": "medication | procedure | therapy | other",
   "description": "...", "clinical_indication": "... or null",
   "started_at": "... or null", "ended_at": "... or null", "outcome": "... or null"}
]}"#;

const LABS_INSTRUCTIONS: &str = r#"Extract every lab result.
Classify status as critical, abnormal_high, abnormal_low or normal using the reference range.
Return:
{"lab_results": [
  {"id": "l1", "test_name": "...", "test_category": "... or null", "value": number or text,
   "unit": "... or null", "status": "critical | abnormal_high | abnormal_low | normal",
   "reference_range": "... or null", "clinical_significance": "... or null"}
],
 "lab_summary": {"total_tests": 0, "critical_count": 0, "abnormal_count": 0, "normal_count": 0}}"#;

const FACILITY_TIMING_INSTRUCTIONS: &str = r#"Extract the facility and the admission and discharge timing.
Also report the encounter identifier. Look for labels such as "DOC_ID:", "Encounter ID:",
"Account Number:", "Visit ID:" or "Admission Number:".
Return:
{"facility": {"facility_name": "...", "facility_id": "... or null",
              "facility_type": "acute_care | psychiatric | rehabilitation | ltac",
              "address": {"street": "... or null", "city": "...", "state": "...", "zip": "... or null"} or null},
 "timing": {"admission_date": "YYYY-MM-DD", "admission_time": "HH:MM or null",
            "discharge_date": "YYYY-MM-DD", "discharge_time": "HH:MM or null",
            "admission_source": "... or null", "discharge_disposition": "... or null"},
 "encounter_id": "... or null"}"#;

const DIAGNOSIS_INSTRUCTIONS: &str = r#"Extract the admission diagnoses.
Return:
{"diagnosis": {
  "primary_diagnosis": "...",
  "primary_diagnosis_icd10": "code or null",
  "primary_diagnosis_evidence": "quote or paraphrase supporting it",
  "diagnosis_category": "...",
  "secondary_diagnoses": [{"diagnosis": "...", "icd10_code": "... or null", "evidence": "...",
                           "relationship_to_primary": "... or null"}]
}}"#;

const MEDICATION_RISK_INSTRUCTIONS: &str = r#"Assess whether this admission was medication related.
Score positive and negative evidence in points, then give a likelihood from 0 to 100.
Return:
{"medication_risk_assessment": {
  "is_medication_related": true or false,
  "risk_scoring": {"positive_evidence_points": 0, "negative_evidence_points": 0, "net_score": 0},
  "likelihood_percentage": {"percentage": 0, "evidence": "..."},
  "risk_level": "high | medium | low",
  "risk_factors": [{"factor": "...", "evidence": "...", "severity": "critical | major | moderate | minor",
                    "implicated_medications": ["..."], "mechanism": "... or null"}],
  "negative_findings": ["..."],
  "confidence_score": 0.0 to 1.0,
  "confidence_rationale": "... or null"
}}"#;
