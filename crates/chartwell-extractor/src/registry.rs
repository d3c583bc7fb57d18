//! Name to capability map
//!
//! Written while the process starts up, read concurrently afterwards. The
//! registry is constructed explicitly and handed to whoever needs it; there
//! is no global instance.

use crate::{Capability, ExtractorError};
use chartwell_domain::RecordKind;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Name, destination and schema of one registered capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInfo {
    /// Registry key
    pub name: String,
    /// Record kind it feeds
    pub record_kind: RecordKind,
    /// Declared output schema tag
    pub output_schema: String,
}

/// Registry of capabilities keyed by name
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: RwLock<HashMap<String, Arc<dyn Capability>>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.list())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, replacing any entry with the same name
    ///
    /// Returns the replaced capability. Replacements are logged at warn level.
    pub fn register(&self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        let name = capability.name().to_string();
        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), capability);

        if previous.is_some() {
            warn!(capability = %name, "Overwriting registered capability");
        } else {
            debug!(capability = %name, "Registered capability");
        }
        previous
    }

    /// Remove a capability; `false` when it was not registered
    pub fn unregister(&self, name: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Look up a capability by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a capability by its declared output schema tag
    pub fn get_by_output_type(&self, output_schema: &str) -> Option<Arc<dyn Capability>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|capability| capability.output_schema() == output_schema)
            .cloned()
    }

    /// Names of the capabilities feeding one record kind, sorted
    pub fn for_record_kind(&self, kind: RecordKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|capability| capability.record_kind() == kind)
            .map(|capability| capability.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// All registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Descriptions of every registered capability, sorted by name
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        let mut infos: Vec<CapabilityInfo> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|capability| CapabilityInfo {
                name: capability.name().to_string(),
                record_kind: capability.record_kind(),
                output_schema: capability.output_schema().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail with the first name in `names` that is not registered
    pub fn ensure_registered(&self, names: &[&str]) -> Result<(), ExtractorError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match names.iter().find(|name| !entries.contains_key(**name)) {
            Some(missing) => Err(ExtractorError::UnknownCapability((*missing).to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CapabilityError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Fixed {
        name: &'static str,
        kind: RecordKind,
        schema: &'static str,
        marker: u32,
    }

    #[async_trait]
    impl Capability for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn record_kind(&self) -> RecordKind {
            self.kind
        }

        fn output_schema(&self) -> &str {
            self.schema
        }

        async fn invoke(&self, _text: &str) -> Result<Value, CapabilityError> {
            Ok(json!({ "marker": self.marker }))
        }
    }

    fn fixed(name: &'static str, kind: RecordKind, marker: u32) -> Arc<dyn Capability> {
        Arc::new(Fixed {
            name,
            kind,
            schema: "test.v1",
            marker,
        })
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());

        registry.register(fixed("labs", RecordKind::ClinicalSummary, 1));
        assert_eq!(registry.len(), 1);

        let labs = registry.get("labs").unwrap();
        assert_eq!(labs.invoke("x").await.unwrap()["marker"], 1);
        assert!(registry.get("course").is_none());
    }

    #[tokio::test]
    async fn test_overwrite_returns_previous() {
        let registry = CapabilityRegistry::new();
        assert!(registry
            .register(fixed("labs", RecordKind::ClinicalSummary, 1))
            .is_none());

        let previous = registry.register(fixed("labs", RecordKind::ClinicalSummary, 2));
        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("labs").unwrap().invoke("x").await.unwrap()["marker"], 2);
    }

    #[test]
    fn test_lookup_by_kind_and_schema() {
        let registry = CapabilityRegistry::new();
        registry.register(fixed("labs", RecordKind::ClinicalSummary, 1));
        registry.register(fixed("course", RecordKind::ClinicalSummary, 2));
        registry.register(Arc::new(Fixed {
            name: "diagnosis",
            kind: RecordKind::HospitalSummary,
            schema: "hospital.diagnosis.v1",
            marker: 3,
        }));

        assert_eq!(
            registry.for_record_kind(RecordKind::ClinicalSummary),
            vec!["course", "labs"]
        );
        assert_eq!(
            registry
                .get_by_output_type("hospital.diagnosis.v1")
                .map(|c| c.name().to_string()),
            Some("diagnosis".to_string())
        );
        assert!(registry.get_by_output_type("missing.v1").is_none());
        assert_eq!(registry.list(), vec!["course", "diagnosis", "labs"]);
        assert_eq!(registry.describe()[1].record_kind, RecordKind::HospitalSummary);
    }

    #[test]
    fn test_unregister() {
        let registry = CapabilityRegistry::new();
        registry.register(fixed("labs", RecordKind::ClinicalSummary, 1));
        assert!(registry.unregister("labs"));
        assert!(!registry.unregister("labs"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ensure_registered_names_missing_capability() {
        let registry = CapabilityRegistry::new();
        registry.register(fixed("labs", RecordKind::ClinicalSummary, 1));

        assert!(registry.ensure_registered(&["labs"]).is_ok());
        match registry.ensure_registered(&["labs", "course"]) {
            Err(ExtractorError::UnknownCapability(name)) => assert_eq!(name, "course"),
            other => panic!("expected unknown capability, got {other:?}"),
        }
    }
}
