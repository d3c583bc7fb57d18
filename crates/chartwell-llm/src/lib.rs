//! Chartwell LLM Provider Layer
//!
//! Pluggable backing-model implementations behind the [`LlmProvider`] trait.
//! Every extraction capability that calls a model goes through this boundary.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OllamaProvider`: Local Ollama API integration using JSON mode
//!
//! Providers make exactly one attempt per call. Retries and timeouts belong
//! to the capability invoker, so a provider never hides failures from it.
//!
//! # Examples
//!
//! ```
//! use chartwell_llm::{CompletionRequest, LlmProvider, MockProvider};
//!
//! # tokio_test::block_on(async {
//! let provider = MockProvider::new(r#"{"ok": true}"#);
//! let result = provider.complete(&CompletionRequest::new("test prompt")).await.unwrap();
//! assert_eq!(result, r#"{"ok": true}"#);
//! # });
//! ```

#![warn(missing_docs)]

pub mod ollama;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Request did not complete within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Communication(_) | Self::RateLimitExceeded | Self::Timeout(_)
        )
    }
}

/// One completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Instruction text sent as the system prompt
    pub system: Option<String>,
    /// User prompt (instructions plus document)
    pub prompt: String,
    /// Model override; the provider's default model when absent
    pub model: Option<String>,
    /// Ask the backend to constrain output to a JSON object
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Plain prompt with provider defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: None,
            json_mode: false,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Override the model for this call
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Request JSON output
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A backing model that turns a prompt into text
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Default model identity, used as the model/version tag on records
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error(LlmError),
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls. A
/// response is chosen by the first registered marker found in the system
/// prompt; otherwise the default response is returned. The prompt is never
/// searched, so document text cannot select another marker's response.
///
/// # Examples
///
/// ```
/// use chartwell_llm::{CompletionRequest, LlmError, LlmProvider, MockProvider};
///
/// # tokio_test::block_on(async {
/// let mut provider = MockProvider::default();
/// provider.add_response("[labs]", r#"{"lab_results": []}"#);
/// provider.add_error("[course]", LlmError::RateLimitExceeded);
///
/// let labs = CompletionRequest::new("doc").with_system("[labs] extract labs");
/// assert_eq!(provider.complete(&labs).await.unwrap(), r#"{"lab_results": []}"#);
///
/// let course = CompletionRequest::new("doc").with_system("[course] extract course");
/// assert!(provider.complete(&course).await.is_err());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
    default_response: String,
    responses: Arc<Mutex<Vec<(String, MockReply)>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            model: "mock-model".to_string(),
            default_response: response.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report a different model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Return `response` whenever `marker` appears in the system prompt
    pub fn add_response(&mut self, marker: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((marker.into(), MockReply::Text(response.into())));
    }

    /// Fail with `error` whenever `marker` appears in the system prompt
    pub fn add_error(&mut self, marker: impl Into<String>, error: LlmError) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((marker.into(), MockReply::Error(error)));
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let matched = responses.iter().find(|(marker, _)| {
            request
                .system
                .as_deref()
                .is_some_and(|system| system.contains(marker.as_str()))
        });

        match matched {
            Some((_, MockReply::Text(response))) => Ok(response.clone()),
            Some((_, MockReply::Error(error))) => Err(error.clone()),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
