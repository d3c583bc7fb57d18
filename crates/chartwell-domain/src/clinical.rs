//! Clinical summary record
//!
//! Eight capabilities feed this record, one per section. Their outputs are
//! the `*Output` types below; the aggregator stitches them into a
//! [`ClinicalSummary`] and wraps it with [`RecordMetadata`].

// Field names mirror the capability JSON and are documented per struct
#![allow(missing_docs)]

use crate::RecordMetadata;
use serde::{Deserialize, Serialize};

/// How the patient presented
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationData {
    pub symptoms: Vec<String>,
    pub symptom_source: Option<String>,
    pub presentation_method: Option<String>,
    pub presentation_details: Option<String>,
    pub presentation_timeline: Option<String>,
    pub severity_indicators: Vec<String>,
}

/// A documented medical condition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicalCondition {
    pub condition_name: String,
    pub icd10_code: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub documented_in_section: Option<String>,
}

/// Relevant past history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryData {
    pub conditions: Vec<MedicalCondition>,
}

/// Lab result classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Critical,
    AbnormalHigh,
    AbnormalLow,
    #[default]
    Normal,
}

impl LabStatus {
    /// Abnormal in either direction (critical excluded)
    pub fn is_abnormal(&self) -> bool {
        matches!(self, LabStatus::AbnormalHigh | LabStatus::AbnormalLow)
    }
}

/// A lab value is numeric when the document gives a number, free text otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabValue {
    Number(f64),
    Text(String),
}

impl Default for LabValue {
    fn default() -> Self {
        LabValue::Text(String::new())
    }
}

/// One lab test result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabTest {
    pub id: String,
    pub test_name: String,
    pub test_category: Option<String>,
    pub value: LabValue,
    pub unit: Option<String>,
    pub status: LabStatus,
    pub reference_range: Option<String>,
    pub clinical_significance: Option<String>,
}

/// Counts over the lab list
///
/// Signed so that an out-of-range value reported by a capability survives
/// decoding and is caught by validation instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSummary {
    pub total_tests: i64,
    pub critical_count: i64,
    pub abnormal_count: i64,
    pub normal_count: i64,
}

impl LabSummary {
    /// Compute counts from a lab list
    pub fn from_labs(labs: &[LabTest]) -> Self {
        let total = labs.len() as i64;
        let critical = labs
            .iter()
            .filter(|lab| lab.status == LabStatus::Critical)
            .count() as i64;
        let abnormal = labs.iter().filter(|lab| lab.status.is_abnormal()).count() as i64;

        Self {
            total_tests: total,
            critical_count: critical,
            abnormal_count: abnormal,
            normal_count: total - critical - abnormal,
        }
    }

    /// Whether a capability populated the summary itself
    pub fn is_populated(&self) -> bool {
        self.total_tests > 0
    }

    /// Keep a populated summary; otherwise fall back to counting `labs`
    pub fn or_computed_from(self, labs: &[LabTest]) -> Self {
        if self.is_populated() {
            self
        } else {
            Self::from_labs(labs)
        }
    }
}

/// A vital sign measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalSign {
    pub measurement: String,
    pub value: LabValue,
    pub unit: Option<String>,
    pub status: Option<String>,
}

/// Physical exam finding for one body system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamFinding {
    pub system: String,
    pub finding: String,
    pub status: Option<String>,
}

/// One imaging study and its impression
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingStudy {
    pub study: String,
    pub date: Option<String>,
    pub findings: Vec<String>,
    pub impression: Option<String>,
}

/// Objective findings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingsData {
    pub vital_signs: Vec<VitalSign>,
    pub physical_exam_findings: Vec<ExamFinding>,
    pub imaging_findings: Vec<ImagingStudy>,
}

/// Clinician assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentData {
    pub primary_diagnosis: String,
    pub primary_diagnosis_source: Option<String>,
    pub secondary_diagnoses: Vec<String>,
    pub clinical_reasoning: Vec<String>,
    pub implicated_medications: Vec<String>,
    pub fall_risk_level: Option<String>,
}

/// One dated event in the hospital course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseEvent {
    pub event: String,
    pub time: Option<String>,
    pub details: Option<String>,
}

/// Hospital course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseData {
    pub timeline: Vec<CourseEvent>,
    pub narrative_summary: Option<String>,
    pub disposition: Option<String>,
    pub admission_date: Option<String>,
    pub discharge_date: Option<String>,
}

/// Follow-up appointment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appointment {
    pub specialty: String,
    pub urgency: Option<String>,
    pub timeframe: Option<String>,
    pub provider: Option<String>,
}

/// Post-discharge plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpData {
    pub appointments: Vec<Appointment>,
    pub discharge_instructions: Vec<String>,
    pub recommendations: Vec<String>,
    pub patient_education: Vec<String>,
}

/// Treatment or procedure performed during the stay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Treatment {
    pub id: String,
    pub treatment_type: String,
    pub description: String,
    pub clinical_indication: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub outcome: Option<String>,
}

// Capability outputs. Field names match the JSON each capability returns.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationOutput {
    pub patient_presentation: PresentationData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryOutput {
    pub relevant_history: HistoryData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingsOutput {
    pub clinical_findings: FindingsData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutput {
    pub clinical_assessment: AssessmentData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseOutput {
    pub hospital_course: CourseData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpOutput {
    pub follow_up_plan: FollowUpData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentsOutput {
    #[serde(default)]
    pub treatments_procedures: Vec<Treatment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabsOutput {
    #[serde(default)]
    pub lab_results: Vec<LabTest>,
    #[serde(default)]
    pub lab_summary: LabSummary,
}

/// All clinical sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalSummary {
    pub patient_presentation: PresentationData,
    pub relevant_history: HistoryData,
    pub clinical_findings: FindingsData,
    pub clinical_assessment: AssessmentData,
    pub hospital_course: CourseData,
    pub follow_up_plan: FollowUpData,
    #[serde(default)]
    pub treatments_procedures: Vec<Treatment>,
    #[serde(default)]
    pub lab_results: Vec<LabTest>,
    #[serde(default)]
    pub lab_summary: LabSummary,
}

/// The clinical summary composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalSummaryRecord {
    pub summary: ClinicalSummary,
    pub metadata: RecordMetadata,
}
