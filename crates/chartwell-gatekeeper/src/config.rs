//! Gatekeeper configuration

use crate::GatekeeperError;
use serde::Deserialize;

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject composites without an injected correlation id
    pub require_correlation_id: bool,

    /// Reject composites whose required text fields are blank
    pub require_fields: bool,

    /// Require a primary diagnosis in the clinical assessment section
    pub require_clinical_diagnosis: bool,

    /// Enable lab count checks (non-negative, consistent with the total)
    pub validate_lab_counts: bool,

    /// Enable confidence bounds checking (0.0 to 1.0)
    pub validate_confidence_bounds: bool,

    /// Enable likelihood range checking (0 to 100)
    pub validate_likelihood_range: bool,

    /// Reject stays whose discharge precedes admission
    pub validate_chronology: bool,

    /// Minimum medication risk confidence accepted
    pub min_risk_confidence: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_correlation_id: true,
            require_fields: true,
            require_clinical_diagnosis: false,
            validate_lab_counts: true,
            validate_confidence_bounds: true,
            validate_likelihood_range: true,
            validate_chronology: true,
            min_risk_confidence: 0.0,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (structural checks only)
    pub fn permissive() -> Self {
        Self {
            require_correlation_id: true,
            require_fields: false,
            require_clinical_diagnosis: false,
            validate_lab_counts: true,
            validate_confidence_bounds: true,
            validate_likelihood_range: false,
            validate_chronology: false,
            min_risk_confidence: 0.0,
        }
    }

    /// Create a strict configuration (all validations enabled)
    pub fn strict() -> Self {
        Self {
            require_correlation_id: true,
            require_fields: true,
            require_clinical_diagnosis: true,
            validate_lab_counts: true,
            validate_confidence_bounds: true,
            validate_likelihood_range: true,
            validate_chronology: true,
            min_risk_confidence: 0.5,
        }
    }

    /// Check the configuration itself
    pub fn validate(&self) -> Result<(), GatekeeperError> {
        if !(0.0..=1.0).contains(&self.min_risk_confidence) {
            return Err(GatekeeperError::Config(format!(
                "min_risk_confidence must be within [0.0, 1.0], got {}",
                self.min_risk_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert!(config.require_correlation_id);
        assert!(config.validate_lab_counts);
        assert!(!config.require_clinical_diagnosis);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_permissive_config() {
        let config = ValidationConfig::permissive();
        assert!(!config.require_fields);
        assert_eq!(config.min_risk_confidence, 0.0);
    }

    #[test]
    fn test_strict_config() {
        let config = ValidationConfig::strict();
        assert!(config.require_clinical_diagnosis);
        assert_eq!(config.min_risk_confidence, 0.5);
    }

    #[test]
    fn test_invalid_min_confidence() {
        let config = ValidationConfig {
            min_risk_confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GatekeeperError::Config(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ValidationConfig = toml::from_str("min_risk_confidence = 0.3").unwrap();
        assert_eq!(config.min_risk_confidence, 0.3);
        assert!(config.validate_chronology);
    }
}
