//! Composite validation logic

use crate::{GatekeeperError, ValidationConfig};
use chartwell_domain::{
    ClinicalSummaryRecord, Composite, CompositeRecord, HospitalSummaryRecord, RecordMetadata,
};
use std::fmt;

/// Result of composite validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the composite passed validation
    pub status: ValidationStatus,

    /// Rejection reasons (if any)
    pub reasons: Vec<RejectionReason>,

    /// Quality score (0.0-1.0)
    pub quality_score: f64,
}

impl ValidationResult {
    /// Whether the composite was accepted
    pub fn is_accepted(&self) -> bool {
        self.status == ValidationStatus::Accepted
    }

    /// Turn a rejection into an error naming the record kind
    pub fn into_result(self, record: impl Into<String>) -> Result<(), GatekeeperError> {
        match self.status {
            ValidationStatus::Accepted => Ok(()),
            ValidationStatus::Rejected => Err(GatekeeperError::Rejected {
                record: record.into(),
                reasons: self.reasons,
            }),
        }
    }
}

/// Validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Composite accepted
    Accepted,

    /// Composite rejected
    Rejected,
}

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// A required field is absent or blank
    MissingField(String),

    /// A count is negative
    NegativeCount {
        /// Field holding the count
        field: String,
        /// Offending value
        value: i64,
    },

    /// Category counts exceed the total
    InconsistentCounts {
        /// Reported total
        total: i64,
        /// Sum of the category counts
        sum: i64,
    },

    /// A value lies outside its allowed range
    OutOfRange {
        /// Field holding the value
        field: String,
        /// Offending value
        value: String,
        /// Allowed range
        range: String,
    },

    /// Discharge precedes admission
    DischargeBeforeAdmission {
        /// Admission date as extracted
        admission: String,
        /// Discharge date as extracted
        discharge: String,
    },

    /// Risk confidence below the configured minimum
    ConfidenceBelowMinimum {
        /// Minimum confidence required
        required: f64,
        /// Actual confidence
        actual: f64,
    },
}

impl RejectionReason {
    fn weight(&self) -> f64 {
        match self {
            RejectionReason::MissingField(_) => 0.3,
            RejectionReason::NegativeCount { .. } => 0.4,
            RejectionReason::InconsistentCounts { .. } => 0.3,
            RejectionReason::OutOfRange { .. } => 0.4,
            RejectionReason::DischargeBeforeAdmission { .. } => 0.3,
            RejectionReason::ConfidenceBelowMinimum { .. } => 0.2,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MissingField(field) => write!(f, "{field} is required"),
            RejectionReason::NegativeCount { field, value } => {
                write!(f, "{field} must not be negative (got {value})")
            }
            RejectionReason::InconsistentCounts { total, sum } => {
                write!(f, "lab category counts sum to {sum} but total_tests is {total}")
            }
            RejectionReason::OutOfRange {
                field,
                value,
                range,
            } => write!(f, "{field} {value} is outside {range}"),
            RejectionReason::DischargeBeforeAdmission {
                admission,
                discharge,
            } => write!(f, "discharge {discharge} precedes admission {admission}"),
            RejectionReason::ConfidenceBelowMinimum { required, actual } => {
                write!(f, "risk confidence {actual} is below the minimum {required}")
            }
        }
    }
}

/// Rules for one composite type
pub trait Validatable {
    /// Push every rule violation onto `reasons`
    fn check(&self, config: &ValidationConfig, reasons: &mut Vec<RejectionReason>);
}

fn check_metadata(
    metadata: &RecordMetadata,
    config: &ValidationConfig,
    reasons: &mut Vec<RejectionReason>,
) {
    if metadata.owner_id.trim().is_empty() {
        reasons.push(RejectionReason::MissingField("owner_id".to_string()));
    }
    if config.require_correlation_id && metadata.correlation_id.is_none() {
        reasons.push(RejectionReason::MissingField("correlation_id".to_string()));
    }
    if config.validate_confidence_bounds {
        if let Some(score) = metadata.confidence_score {
            check_unit_interval("metadata.confidence_score", score, reasons);
        }
    }
}

fn check_unit_interval(field: &str, value: f64, reasons: &mut Vec<RejectionReason>) {
    if !(0.0..=1.0).contains(&value) {
        reasons.push(RejectionReason::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            range: "[0.0, 1.0]".to_string(),
        });
    }
}

fn require_text(field: &str, value: &str, reasons: &mut Vec<RejectionReason>) {
    if value.trim().is_empty() {
        reasons.push(RejectionReason::MissingField(field.to_string()));
    }
}

impl Validatable for ClinicalSummaryRecord {
    fn check(&self, config: &ValidationConfig, reasons: &mut Vec<RejectionReason>) {
        check_metadata(&self.metadata, config, reasons);

        if config.require_clinical_diagnosis {
            require_text(
                "clinical_assessment.primary_diagnosis",
                &self.summary.clinical_assessment.primary_diagnosis,
                reasons,
            );
        }

        if config.validate_lab_counts {
            let labs = &self.summary.lab_summary;
            let counts = [
                ("lab_summary.total_tests", labs.total_tests),
                ("lab_summary.critical_count", labs.critical_count),
                ("lab_summary.abnormal_count", labs.abnormal_count),
                ("lab_summary.normal_count", labs.normal_count),
            ];
            let mut any_negative = false;
            for (field, value) in counts {
                if value < 0 {
                    any_negative = true;
                    reasons.push(RejectionReason::NegativeCount {
                        field: field.to_string(),
                        value,
                    });
                }
            }

            let sum = labs.critical_count + labs.abnormal_count + labs.normal_count;
            if !any_negative && sum > labs.total_tests {
                reasons.push(RejectionReason::InconsistentCounts {
                    total: labs.total_tests,
                    sum,
                });
            }
        }
    }
}

impl Validatable for HospitalSummaryRecord {
    fn check(&self, config: &ValidationConfig, reasons: &mut Vec<RejectionReason>) {
        check_metadata(&self.metadata, config, reasons);
        let risk = &self.medication_risk_assessment;

        if config.require_fields {
            require_text("facility.facility_name", &self.facility.facility_name, reasons);
            require_text("timing.admission_date", &self.timing.admission_date, reasons);
            require_text("timing.discharge_date", &self.timing.discharge_date, reasons);
            require_text(
                "diagnosis.primary_diagnosis",
                &self.diagnosis.primary_diagnosis,
                reasons,
            );
        }

        if config.validate_chronology && self.timing.is_chronological() == Some(false) {
            reasons.push(RejectionReason::DischargeBeforeAdmission {
                admission: self.timing.admission_date.clone(),
                discharge: self.timing.discharge_date.clone(),
            });
        }

        if config.validate_likelihood_range {
            let percentage = risk.likelihood_percentage.percentage;
            if !(0..=100).contains(&percentage) {
                reasons.push(RejectionReason::OutOfRange {
                    field: "likelihood_percentage.percentage".to_string(),
                    value: percentage.to_string(),
                    range: "[0, 100]".to_string(),
                });
            }
        }

        // Evidence points are never negative, whatever the config relaxes
        let scoring = &risk.risk_scoring;
        for (field, value) in [
            ("risk_scoring.positive_evidence_points", scoring.positive_evidence_points),
            ("risk_scoring.negative_evidence_points", scoring.negative_evidence_points),
        ] {
            if value < 0 {
                reasons.push(RejectionReason::NegativeCount {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if config.validate_confidence_bounds {
            check_unit_interval(
                "medication_risk_assessment.confidence_score",
                risk.confidence_score,
                reasons,
            );
        }

        if risk.confidence_score < config.min_risk_confidence {
            reasons.push(RejectionReason::ConfidenceBelowMinimum {
                required: config.min_risk_confidence,
                actual: risk.confidence_score,
            });
        }
    }
}

/// The Gatekeeper validates composites before storage
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    config: ValidationConfig,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate one composite against the configured rules
    pub fn validate<R: Validatable>(&self, record: &R) -> ValidationResult {
        let mut reasons = Vec::new();
        record.check(&self.config, &mut reasons);

        let quality_score = reasons
            .iter()
            .fold(1.0_f64, |score, reason| score - reason.weight())
            .max(0.0);

        let status = if reasons.is_empty() {
            ValidationStatus::Accepted
        } else {
            ValidationStatus::Rejected
        };

        ValidationResult {
            status,
            reasons,
            quality_score,
        }
    }

    /// Validate a composite of any kind
    pub fn validate_composite(&self, composite: &Composite) -> ValidationResult {
        match composite {
            Composite::Clinical(record) => self.validate(record.as_ref()),
            Composite::Hospital(record) => self.validate(record.as_ref()),
        }
    }

    /// Validate and convert a rejection into [`GatekeeperError::Rejected`]
    pub fn check<R: Validatable + CompositeRecord>(&self, record: &R) -> Result<(), GatekeeperError> {
        self.validate(record).into_result(R::KIND.as_str())
    }
}
