//! The capability contract and its LLM-backed implementation

use crate::parser::parse_object;
use crate::prompt::PromptBuilder;
use crate::CapabilityError;
use async_trait::async_trait;
use chartwell_domain::RecordKind;
use chartwell_llm::{CompletionRequest, LlmProvider};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A named, stateless unit mapping raw text to a structured result
///
/// Implementations must tell invalid input apart from transient remote
/// failure; the invoker retries only the latter.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Record kind this capability feeds
    fn record_kind(&self) -> RecordKind;

    /// Declared output schema tag, e.g. `clinical.labs.v1`
    fn output_schema(&self) -> &str;

    /// Model identity behind this capability, if any
    fn model_version(&self) -> Option<String> {
        None
    }

    /// Run once over `text`
    async fn invoke(&self, text: &str) -> Result<Value, CapabilityError>;
}

/// Capability answered by a backing model
pub struct LlmCapability {
    name: String,
    record_kind: RecordKind,
    output_schema: String,
    instructions: String,
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl LlmCapability {
    /// Create a capability using the provider's default model
    pub fn new(
        name: impl Into<String>,
        record_kind: RecordKind,
        output_schema: impl Into<String>,
        instructions: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            record_kind,
            output_schema: output_schema.into(),
            instructions: instructions.into(),
            provider,
            model: None,
        }
    }

    /// Override the model identity for this capability
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Override the instruction text
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Active instruction text
    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

impl std::fmt::Debug for LlmCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCapability")
            .field("name", &self.name)
            .field("record_kind", &self.record_kind)
            .field("output_schema", &self.output_schema)
            .field("model", &self.model_version())
            .finish()
    }
}

#[async_trait]
impl Capability for LlmCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn record_kind(&self) -> RecordKind {
        self.record_kind
    }

    fn output_schema(&self) -> &str {
        &self.output_schema
    }

    fn model_version(&self) -> Option<String> {
        Some(
            self.model
                .clone()
                .unwrap_or_else(|| self.provider.model_name().to_string()),
        )
    }

    async fn invoke(&self, text: &str) -> Result<Value, CapabilityError> {
        if text.trim().is_empty() {
            return Err(CapabilityError::InvalidInput("text is empty".to_string()));
        }

        let prompt = PromptBuilder::new(&self.name, &self.instructions, text)
            .with_output_schema(&self.output_schema)
            .build();
        let request = CompletionRequest::new(prompt.user)
            .with_system(prompt.system)
            .with_model(self.model.clone())
            .json();

        let response = self.provider.complete(&request).await?;
        debug!(
            capability = %self.name,
            response_len = response.len(),
            "Model responded"
        );

        parse_object(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_llm::{LlmError, MockProvider};

    fn labs(provider: MockProvider) -> LlmCapability {
        LlmCapability::new(
            "labs",
            RecordKind::ClinicalSummary,
            "clinical.labs.v1",
            "Extract every lab result.",
            Arc::new(provider),
        )
    }

    #[tokio::test]
    async fn test_invoke_returns_parsed_object() {
        let mut provider = MockProvider::default();
        provider.add_response("[labs]", "```json\n{\"lab_results\": []}\n```");
        let capability = labs(provider);

        let value = capability.invoke("Na 128").await.unwrap();
        assert!(value["lab_results"].is_array());
    }

    #[tokio::test]
    async fn test_invoke_sends_json_request_with_model_override() {
        let provider = MockProvider::new("{}");
        let capability = labs(provider.clone()).with_model(Some("llama3.1:70b".to_string()));

        capability.invoke("Na 128").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].model.as_deref(), Some("llama3.1:70b"));
        assert!(requests[0].prompt.contains("Na 128"));
        assert_eq!(capability.model_version().as_deref(), Some("llama3.1:70b"));
    }

    #[tokio::test]
    async fn test_instruction_override_reaches_system_prompt() {
        let provider = MockProvider::new("{}");
        let capability = labs(provider.clone()).with_instructions("Only critical values.");

        capability.invoke("K 6.8").await.unwrap();
        let system = provider.requests()[0].system.clone().unwrap_or_default();
        assert!(system.contains("Only critical values."));
        assert!(!system.contains("Extract every lab result."));
    }

    #[tokio::test]
    async fn test_invoke_rejects_blank_text() {
        let capability = labs(MockProvider::new("{}"));
        let result = capability.invoke("  ").await;
        assert!(matches!(result, Err(CapabilityError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_provider_errors_are_classified() {
        let mut provider = MockProvider::default();
        provider.add_error("[labs]", LlmError::Communication("reset".to_string()));
        let result = labs(provider).invoke("Na 128").await;
        assert!(matches!(result, Err(CapabilityError::Transient(_))));

        let result = labs(MockProvider::new("no json here")).invoke("Na 128").await;
        assert!(matches!(result, Err(CapabilityError::InvalidOutput(_))));
    }
}
