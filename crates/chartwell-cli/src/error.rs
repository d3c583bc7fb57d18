//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extraction pipeline error
    #[error(transparent)]
    Extractor(#[from] chartwell_extractor::ExtractorError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] chartwell_store::StoreError),

    /// Backing model setup error
    #[error("Model error: {0}")]
    Llm(#[from] chartwell_llm::LlmError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nothing matched the lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Some documents in a batch failed
    #[error("{failed} of {total} document(s) failed")]
    BatchFailed {
        /// Documents that failed
        failed: usize,
        /// Documents attempted
        total: usize,
    },
}
