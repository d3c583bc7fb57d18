//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local LLM API. Clinical documents stay
//! on the host running the model.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama generate API
//! - Configurable endpoint, default model and request timeout
//! - JSON mode (`"format": "json"`) for structured extraction
//! - Per-request model override and system prompt
//!
//! # Examples
//!
//! ```no_run
//! use chartwell_llm::{CompletionRequest, LlmProvider, OllamaProvider};
//!
//! # async fn run() -> Result<(), chartwell_llm::LlmError> {
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1")?;
//! let request = CompletionRequest::new("Extract the diagnosis").json();
//! let json = provider.complete(&request).await?;
//! # Ok(())
//! # }
//! ```

use crate::{CompletionRequest, LlmError, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (180 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    stream: bool,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider with the default request timeout
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Default model (e.g., "llama3.1", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new Ollama provider with an explicit request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    /// Create a new Ollama provider on `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    fn classify_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(format!("Request to {} timed out", self.endpoint))
        } else {
            LlmError::Communication(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    /// Send one generate request
    ///
    /// # Errors
    ///
    /// - `ModelNotAvailable` when Ollama answers 404 for the model
    /// - `RateLimitExceeded` on HTTP 429
    /// - `Communication` / `Timeout` when the server is unreachable or slow
    /// - `InvalidResponse` when the body is not a generate response
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let model = request.model.as_deref().unwrap_or(&self.model);

        let body = OllamaGenerateRequest {
            model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            format: request.json_mode.then_some("json"),
            stream: false,
        };

        tracing::debug!(model, json_mode = request.json_mode, "Sending Ollama generate request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(model.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<OllamaGenerateResponse>()
            .await
            .map(|r| r.response)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
