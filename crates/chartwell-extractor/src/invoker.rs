//! Timeout and bounded retries around one capability call

use crate::{
    Capability, CapabilityError, CapabilityRegistry, ExtractionFailure, ExtractorConfig,
    InvocationPolicy,
};
use chartwell_domain::PartialResult;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Invoke `capability` over `text` under `policy`
///
/// Each attempt runs under `policy.timeout`. Transient failures, timeouts and
/// outputs that do not decode into `T` are retried, up to
/// `policy.max_attempts()` attempts in total. Any other failure ends the call
/// at once. Nothing is carried over from one attempt to the next.
pub async fn invoke<T: DeserializeOwned>(
    capability: &dyn Capability,
    text: &str,
    policy: &InvocationPolicy,
) -> Result<PartialResult<T>, ExtractionFailure> {
    let name = capability.name();
    let mut backoff = policy.backoff;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let outcome = match tokio::time::timeout(policy.timeout, capability.invoke(text)).await {
            Ok(Ok(value)) => serde_json::from_value::<T>(value).map_err(|e| {
                CapabilityError::InvalidOutput(format!(
                    "does not match {}: {}",
                    capability.output_schema(),
                    e
                ))
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CapabilityError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(data) => {
                debug!(capability = name, attempts, "Capability succeeded");
                return Ok(PartialResult::new(name, data));
            }
            Err(e) if e.is_retryable() && attempts < policy.max_attempts() => {
                warn!(
                    capability = name,
                    attempt = attempts,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Capability failed, retrying"
                );
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
            Err(e) => {
                error!(capability = name, attempts, error = %e, "Capability failed");
                return Err(ExtractionFailure {
                    capability: name.to_string(),
                    attempts,
                    last_error: e,
                });
            }
        }
    }
}

/// Resolves capabilities by name and invokes them under configured policies
#[derive(Debug, Clone)]
pub struct CapabilityInvoker {
    registry: Arc<CapabilityRegistry>,
    config: Arc<ExtractorConfig>,
}

impl CapabilityInvoker {
    /// Create an invoker over a registry and configuration
    pub fn new(registry: Arc<CapabilityRegistry>, config: Arc<ExtractorConfig>) -> Self {
        Self { registry, config }
    }

    /// The registry capabilities are resolved from
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Look up `name` and invoke it under its configured policy
    pub async fn run<T: DeserializeOwned>(
        &self,
        name: &str,
        text: &str,
    ) -> Result<PartialResult<T>, ExtractionFailure> {
        let Some(capability) = self.registry.get(name) else {
            return Err(ExtractionFailure {
                capability: name.to_string(),
                attempts: 0,
                last_error: CapabilityError::Fatal("capability is not registered".to_string()),
            });
        };
        let policy = self.config.policy_for(name);
        invoke(capability.as_ref(), text, &policy).await
    }

    /// Model/version tag for records fed by `name`
    ///
    /// The configured tag wins over the capability's own model identity.
    pub fn model_version(&self, name: &str) -> Option<String> {
        self.config
            .model_version
            .clone()
            .or_else(|| self.registry.get(name).and_then(|c| c.model_version()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chartwell_domain::RecordKind;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Output {
        value: u32,
    }

    /// Fails with `error` for the first `failures` calls, then succeeds
    struct Flaky {
        failures: u32,
        error: CapabilityError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: CapabilityError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Capability for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn record_kind(&self) -> RecordKind {
            RecordKind::ClinicalSummary
        }

        fn output_schema(&self) -> &str {
            "test.flaky.v1"
        }

        async fn invoke(&self, _text: &str) -> Result<Value, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(json!({ "value": call }))
            }
        }
    }

    /// Never answers
    struct Hanging;

    #[async_trait]
    impl Capability for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        fn record_kind(&self) -> RecordKind {
            RecordKind::HospitalSummary
        }

        fn output_schema(&self) -> &str {
            "test.hanging.v1"
        }

        async fn invoke(&self, _text: &str) -> Result<Value, CapabilityError> {
            std::future::pending().await
        }
    }

    fn policy(max_retries: u32) -> InvocationPolicy {
        InvocationPolicy::new(Duration::from_millis(50), max_retries)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let capability = Flaky::new(2, CapabilityError::Transient("503".to_string()));
        let partial = invoke::<Output>(&capability, "text", &policy(2)).await.unwrap();

        assert_eq!(partial.data, Output { value: 2 });
        assert_eq!(partial.capability, "flaky");
        assert!(!partial.is_backfilled());
        assert_eq!(capability.calls(), 3);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_retries_plus_one() {
        for max_retries in 0..4 {
            let capability = Flaky::new(u32::MAX, CapabilityError::Transient("down".to_string()));
            let failure = invoke::<Output>(&capability, "text", &policy(max_retries))
                .await
                .unwrap_err();

            assert_eq!(capability.calls(), max_retries + 1);
            assert_eq!(failure.attempts, max_retries + 1);
            assert_eq!(failure.capability, "flaky");
            assert_eq!(failure.last_error, CapabilityError::Transient("down".to_string()));
        }
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let capability = Flaky::new(u32::MAX, CapabilityError::Fatal("bad prompt".to_string()));
        let failure = invoke::<Output>(&capability, "text", &policy(5)).await.unwrap_err();

        assert_eq!(capability.calls(), 1);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_retried() {
        let capability = Flaky::new(u32::MAX, CapabilityError::InvalidInput("empty".to_string()));
        invoke::<Output>(&capability, "", &policy(3)).await.unwrap_err();
        assert_eq!(capability.calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_output_is_retried() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            missing_field: String,
        }

        let capability = Flaky::new(0, CapabilityError::Fatal("unused".to_string()));
        let failure = invoke::<Strict>(&capability, "text", &policy(1)).await.unwrap_err();

        assert_eq!(capability.calls(), 2);
        assert!(matches!(failure.last_error, CapabilityError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_each_attempt_times_out() {
        let failure = invoke::<Output>(&Hanging, "text", &policy(1)).await.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.last_error, CapabilityError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_backoff_doubles_between_attempts() {
        let capability = Flaky::new(2, CapabilityError::Transient("busy".to_string()));
        let policy = policy(2).with_backoff(Duration::from_millis(100));

        let started = std::time::Instant::now();
        invoke::<Output>(&capability, "text", &policy).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_run_resolves_by_name() {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register(Arc::new(Flaky::new(0, CapabilityError::Fatal("unused".to_string()))));
        let invoker = CapabilityInvoker::new(registry, Arc::new(ExtractorConfig::default()));

        let partial = invoker.run::<Output>("flaky", "text").await.unwrap();
        assert_eq!(partial.data.value, 0);

        let failure = invoker.run::<Output>("absent", "text").await.unwrap_err();
        assert_eq!(failure.attempts, 0);
        assert!(matches!(failure.last_error, CapabilityError::Fatal(_)));
    }

    #[test]
    fn test_configured_model_version_wins() {
        let registry = Arc::new(CapabilityRegistry::new());
        let config = ExtractorConfig {
            model_version: Some("pinned-v2".to_string()),
            ..Default::default()
        };
        let invoker = CapabilityInvoker::new(registry, Arc::new(config));
        assert_eq!(invoker.model_version("labs").as_deref(), Some("pinned-v2"));
    }
}
