//! Configuration for the Extractor

use crate::ExtractorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-capability overrides of the invocation defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverride {
    /// Per-attempt timeout (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Retries after the first attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Timeout and retry budget for one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause before the first retry, doubled on each further retry
    pub backoff: Duration,
}

impl InvocationPolicy {
    /// Policy with no backoff between attempts
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    /// Set the initial backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Upper bound on attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum input text length (bytes)
    pub max_text_length: usize,

    /// Per-attempt timeout for a capability call (seconds)
    pub capability_timeout_secs: u64,

    /// Retries after the first attempt of a capability call
    pub max_retries: u32,

    /// Initial pause between attempts (milliseconds); zero disables
    pub retry_backoff_ms: u64,

    /// Model/version tag recorded on every composite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Overrides keyed by capability name
    pub capabilities: BTreeMap<String, CapabilityOverride>,
}

impl ExtractorConfig {
    /// Get the default capability timeout as a Duration
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.capability_timeout_secs)
    }

    /// Invocation policy for one capability, overrides applied
    pub fn policy_for(&self, capability: &str) -> InvocationPolicy {
        let overrides = self.capabilities.get(capability);
        let timeout_secs = overrides
            .and_then(|o| o.timeout_secs)
            .unwrap_or(self.capability_timeout_secs);
        let max_retries = overrides
            .and_then(|o| o.max_retries)
            .unwrap_or(self.max_retries);

        InvocationPolicy::new(Duration::from_secs(timeout_secs), max_retries)
            .with_backoff(Duration::from_millis(self.retry_backoff_ms))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.max_text_length == 0 {
            return Err(ExtractorError::Config(
                "max_text_length must be greater than 0".to_string(),
            ));
        }
        if self.capability_timeout_secs == 0 {
            return Err(ExtractorError::Config(
                "capability_timeout_secs must be greater than 0".to_string(),
            ));
        }
        for (name, overrides) in &self.capabilities {
            if overrides.timeout_secs == Some(0) {
                return Err(ExtractorError::Config(format!(
                    "capabilities.{name}.timeout_secs must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 100_000,
            capability_timeout_secs: 180,
            max_retries: 2,
            retry_backoff_ms: 500,
            model_version: None,
            capabilities: BTreeMap::new(),
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: short timeouts, a single retry
    pub fn aggressive() -> Self {
        Self {
            max_text_length: 50_000,
            capability_timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 250,
            ..Self::default()
        }
    }

    /// Lenient preset: long timeouts, more retries for slow local models
    pub fn lenient() -> Self {
        Self {
            max_text_length: 250_000,
            capability_timeout_secs: 300,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}
