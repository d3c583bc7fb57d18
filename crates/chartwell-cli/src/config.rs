//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use chartwell_extractor::ExtractorConfig;
use chartwell_gatekeeper::ValidationConfig;
use chartwell_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database and pool
    pub database: StoreConfig,

    /// Backing model connection
    pub llm: LlmConfig,

    /// Capability invocation policy
    pub extractor: ExtractorConfig,

    /// Composite validation rules
    pub validation: ValidationConfig,

    /// Log filter
    pub logging: LoggingConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Backing model connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Log filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable colored output
    pub color: bool,

    /// Default output format
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

impl AppConfig {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".chartwell").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is read
    /// when present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_toml(&fs::read_to_string(path)?)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_toml(&fs::read_to_string(&path)?)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(CliError::Config(
                "database.pool_size must be greater than 0".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(CliError::Config("llm.model is required".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(CliError::Config(
                "llm.timeout_secs must be greater than 0".into(),
            ));
        }
        self.extractor
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        self.validation
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(())
    }
}
