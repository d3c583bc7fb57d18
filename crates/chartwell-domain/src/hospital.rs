//! Hospital admission summary record
//!
//! Three capabilities feed this record. `facility_timing` also discovers the
//! encounter identifier, so it runs before the other two.

// Field names mirror the capability JSON and are documented per struct
#![allow(missing_docs)]

use crate::RecordMetadata;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of facility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    #[default]
    AcuteCare,
    Psychiatric,
    Rehabilitation,
    Ltac,
}

/// Facility address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: Option<String>,
}

/// Where the stay happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityData {
    pub facility_name: String,
    pub facility_id: Option<String>,
    pub facility_type: FacilityType,
    pub address: Option<Address>,
}

/// Admission and discharge timing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingData {
    pub admission_date: String,
    pub admission_time: Option<String>,
    pub discharge_date: String,
    pub discharge_time: Option<String>,
    pub admission_source: Option<String>,
    pub discharge_disposition: Option<String>,
}

/// Parse an ISO-8601 date or date-time into a naive UTC date-time
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

impl TimingData {
    /// Whole days between admission and discharge
    ///
    /// Never negative; zero when either date cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartwell_domain::hospital::TimingData;
    ///
    /// let timing = TimingData {
    ///     admission_date: "2024-03-01".to_string(),
    ///     discharge_date: "2024-03-05T14:00:00Z".to_string(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(timing.length_of_stay_days(), 4);
    /// ```
    pub fn length_of_stay_days(&self) -> i64 {
        match (
            parse_timestamp(&self.admission_date),
            parse_timestamp(&self.discharge_date),
        ) {
            (Some(admission), Some(discharge)) => (discharge - admission).num_days().max(0),
            _ => 0,
        }
    }

    /// Both dates parse and discharge is not before admission
    pub fn is_chronological(&self) -> Option<bool> {
        let admission = parse_timestamp(&self.admission_date)?;
        let discharge = parse_timestamp(&self.discharge_date)?;
        Some(discharge >= admission)
    }
}

/// A secondary diagnosis with its evidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryDiagnosis {
    pub diagnosis: String,
    pub icd10_code: Option<String>,
    pub evidence: String,
    pub relationship_to_primary: Option<String>,
}

/// Diagnoses for the admission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisData {
    pub primary_diagnosis: String,
    pub primary_diagnosis_icd10: Option<String>,
    pub primary_diagnosis_evidence: String,
    pub diagnosis_category: String,
    pub secondary_diagnoses: Vec<SecondaryDiagnosis>,
}

/// Overall medication risk level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::Low => write!(f, "low"),
        }
    }
}

/// Severity of one risk factor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Critical,
    Major,
    #[default]
    Moderate,
    Minor,
}

/// One medication-related risk factor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskFactor {
    pub factor: String,
    pub evidence: String,
    pub severity: RiskSeverity,
    pub implicated_medications: Vec<String>,
    pub mechanism: Option<String>,
}

/// Evidence scoring behind the likelihood
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskScoring {
    pub positive_evidence_points: i64,
    pub negative_evidence_points: i64,
    pub net_score: i64,
}

/// Likelihood that the presentation is medication related, 0 to 100
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikelihoodPercentage {
    pub percentage: i64,
    pub evidence: String,
}

/// Medication risk assessment for the admission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    pub is_medication_related: bool,
    pub risk_scoring: RiskScoring,
    pub likelihood_percentage: LikelihoodPercentage,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<RiskFactor>,
    pub negative_findings: Vec<String>,
    /// Model confidence, 0.0 to 1.0
    pub confidence_score: f64,
    pub confidence_rationale: Option<String>,
    /// RFC 3339 timestamp; set at assembly when the capability omits it
    pub assessed_at: Option<String>,
}

impl RiskAssessment {
    /// Stamp `assessed_at` unless the capability already provided one
    pub fn ensure_assessed_at(&mut self, now: DateTime<Utc>) {
        let missing = self
            .assessed_at
            .as_deref()
            .map_or(true, |value| value.trim().is_empty());
        if missing {
            self.assessed_at = Some(now.to_rfc3339());
        }
    }
}

/// Output of the `facility_timing` capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityTimingOutput {
    pub facility: FacilityData,
    pub timing: TimingData,
    /// Encounter identifier found in the document
    #[serde(default, alias = "hospitalization_id")]
    pub encounter_id: Option<String>,
}

/// Output of the `diagnosis` capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisOutput {
    pub diagnosis: DiagnosisData,
}

/// Output of the `medication_risk` capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationRiskOutput {
    pub medication_risk_assessment: RiskAssessment,
}

/// The hospital admission summary composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalSummaryRecord {
    pub facility: FacilityData,
    pub timing: TimingData,
    pub diagnosis: DiagnosisData,
    pub medication_risk_assessment: RiskAssessment,
    pub metadata: RecordMetadata,
}

impl HospitalSummaryRecord {
    /// Derived length of stay, see [`TimingData::length_of_stay_days`]
    pub fn length_of_stay_days(&self) -> i64 {
        self.timing.length_of_stay_days()
    }
}
