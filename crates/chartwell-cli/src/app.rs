//! Wiring from configuration to the extraction pipeline.

use crate::config::AppConfig;
use crate::error::Result;
use chartwell_extractor::{catalog, CapabilityRegistry, ExtractionHandler};
use chartwell_gatekeeper::Gatekeeper;
use chartwell_llm::{LlmProvider, OllamaProvider};
use chartwell_store::{Repositories, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Registry holding the full capability catalog on the configured model.
pub fn build_registry(config: &AppConfig) -> Result<Arc<CapabilityRegistry>> {
    let provider = OllamaProvider::with_timeout(
        &config.llm.endpoint,
        &config.llm.model,
        Duration::from_secs(config.llm.timeout_secs),
    )?;
    Ok(registry_with_provider(
        Arc::new(provider),
        config.extractor.model_version.clone(),
    ))
}

/// Registry holding the full capability catalog on `provider`.
pub fn registry_with_provider(
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
) -> Arc<CapabilityRegistry> {
    let registry = Arc::new(CapabilityRegistry::new());
    catalog::register_all(&registry, provider, model);
    registry
}

/// Open the configured database.
pub fn open_repositories(config: &AppConfig) -> Result<Arc<Repositories>> {
    let sessions = SessionManager::open(&config.database)?;
    info!(path = %config.database.path.display(), "Opened record store");
    Ok(Arc::new(Repositories::new(sessions)))
}

/// Handler over the given registry and repositories.
pub fn build_handler(
    config: &AppConfig,
    registry: Arc<CapabilityRegistry>,
    repositories: Arc<Repositories>,
) -> Result<ExtractionHandler> {
    Ok(ExtractionHandler::new(
        registry,
        repositories,
        Gatekeeper::new(config.validation.clone()),
        config.extractor.clone(),
    )?)
}
