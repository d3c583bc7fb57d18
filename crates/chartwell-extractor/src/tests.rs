//! Integration tests for the orchestration handler and aggregators

#[cfg(test)]
mod tests {
    use crate::aggregator::{Aggregator, ClinicalAggregator, HospitalAggregator};
    use crate::catalog::{self, names};
    use crate::{
        Capability, CapabilityError, CapabilityInvoker, CapabilityRegistry, CompositeSink,
        ExtractionHandler, ExtractorConfig, ExtractorError, RecordSummary,
    };
    use async_trait::async_trait;
    use chartwell_domain::{
        Composite, CompositeRecord, CorrelationId, ExtractionRequest, RecordKind,
    };
    use chartwell_gatekeeper::Gatekeeper;
    use chartwell_llm::MockProvider;
    use chartwell_store::{Repositories, SessionManager, StoreConfig, StoreError};
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const NOTE: &str = "DOC_ID:4f2a-9b01\nChief complaint: chest pain\nTroponin 0.9 (critical)";

    #[derive(Clone)]
    enum Script {
        Reply(Value),
        Fail(CapabilityError),
        Hang,
    }

    type Events = Arc<Mutex<Vec<String>>>;

    /// Capability that follows a script and records when it starts and ends
    struct Scripted {
        name: &'static str,
        kind: RecordKind,
        script: Script,
        delay: Duration,
        calls: AtomicU32,
        events: Events,
    }

    #[async_trait]
    impl Capability for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn record_kind(&self) -> RecordKind {
            self.kind
        }

        fn output_schema(&self) -> &str {
            "test.scripted.v1"
        }

        async fn invoke(&self, _text: &str) -> Result<Value, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start:{}", self.name));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = match &self.script {
                Script::Reply(value) => Ok(value.clone()),
                Script::Fail(error) => Err(error.clone()),
                Script::Hang => std::future::pending().await,
            };
            self.events.lock().unwrap().push(format!("end:{}", self.name));
            result
        }
    }

    fn good_output(name: &str) -> Value {
        match name {
            names::PRESENTATION => json!({"patient_presentation": {"symptoms": ["chest pain"]}}),
            names::HISTORY => json!({"relevant_history": {"conditions": [
                {"condition_name": "Hypertension", "status": "chronic"}
            ]}}),
            names::FINDINGS => json!({"clinical_findings": {}}),
            names::ASSESSMENT => json!({"clinical_assessment": {
                "primary_diagnosis": "Acute coronary syndrome"
            }}),
            names::COURSE => json!({"hospital_course": {"disposition": "home"}}),
            names::FOLLOW_UP => json!({"follow_up_plan": {}}),
            names::TREATMENTS => json!({"treatments_procedures": []}),
            names::LABS => json!({"lab_results": [
                {"id": "l1", "test_name": "Troponin", "value": 0.9, "status": "critical"},
                {"id": "l2", "test_name": "Sodium", "value": 139, "status": "normal"}
            ]}),
            names::FACILITY_TIMING => json!({
                "facility": {"facility_name": "St. Mary Medical Center"},
                "timing": {"admission_date": "2024-03-01", "discharge_date": "2024-03-05"},
                "encounter_id": "ENC-42"
            }),
            names::DIAGNOSIS => json!({"diagnosis": {
                "primary_diagnosis": "NSTEMI",
                "primary_diagnosis_evidence": "troponin elevation",
                "diagnosis_category": "cardiac"
            }}),
            names::MEDICATION_RISK => json!({"medication_risk_assessment": {
                "risk_level": "medium",
                "confidence_score": 0.8,
                "likelihood_percentage": {"percentage": 40, "evidence": "recent dose change"}
            }}),
            other => panic!("no output scripted for {other}"),
        }
    }

    /// Registry of scripted capabilities plus handles to inspect them
    struct Harness {
        registry: Arc<CapabilityRegistry>,
        capabilities: HashMap<&'static str, Arc<Scripted>>,
        events: Events,
    }

    impl Harness {
        fn new() -> Self {
            let mut harness = Self {
                registry: Arc::new(CapabilityRegistry::new()),
                capabilities: HashMap::new(),
                events: Arc::new(Mutex::new(Vec::new())),
            };
            for definition in &catalog::CATALOG {
                harness.set(definition.name, Script::Reply(good_output(definition.name)), 0);
            }
            harness
        }

        fn set(&mut self, name: &'static str, script: Script, delay_ms: u64) {
            let kind = catalog::CATALOG
                .iter()
                .find(|d| d.name == name)
                .map(|d| d.record_kind)
                .unwrap();
            let capability = Arc::new(Scripted {
                name,
                kind,
                script,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicU32::new(0),
                events: Arc::clone(&self.events),
            });
            self.registry.register(capability.clone());
            self.capabilities.insert(name, capability);
        }

        fn calls(&self, name: &str) -> u32 {
            self.capabilities[name].calls.load(Ordering::SeqCst)
        }

        fn total_calls(&self) -> u32 {
            self.capabilities
                .values()
                .map(|c| c.calls.load(Ordering::SeqCst))
                .sum()
        }

        fn position(&self, event: &str) -> usize {
            let events = self.events.lock().unwrap();
            events
                .iter()
                .position(|e| e == event)
                .unwrap_or_else(|| panic!("no {event} in {events:?}"))
        }

        fn invoker(&self, config: ExtractorConfig) -> CapabilityInvoker {
            CapabilityInvoker::new(Arc::clone(&self.registry), Arc::new(config))
        }
    }

    fn fast_config() -> ExtractorConfig {
        ExtractorConfig {
            capability_timeout_secs: 1,
            max_retries: 2,
            retry_backoff_ms: 0,
            ..ExtractorConfig::default()
        }
    }

    fn repositories() -> Arc<Repositories> {
        let sessions = SessionManager::open(&StoreConfig::in_memory()).unwrap();
        Arc::new(Repositories::new(sessions))
    }

    fn handler(harness: &Harness, repos: &Arc<Repositories>, config: ExtractorConfig) -> ExtractionHandler {
        let sink: Arc<dyn CompositeSink> = repos.clone();
        ExtractionHandler::new(Arc::clone(&harness.registry), sink, Gatekeeper::default(), config)
            .unwrap()
    }

    async fn stored_count(repos: &Repositories, owner: &str) -> usize {
        repos.clinical.get_by_owner(owner, 100).await.unwrap().len()
            + repos.hospital.get_by_owner(owner, 100).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_process_persists_every_record_with_one_correlation_id() {
        let harness = Harness::new();
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let outcome = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        for summary in outcome.records.values() {
            assert_eq!(summary.correlation_id, outcome.correlation_id);
            assert_eq!(summary.owner_id, "P-1");
        }

        let clinical = repos
            .clinical
            .get_by_correlation_id(outcome.correlation_id)
            .await
            .unwrap()
            .unwrap();
        let hospital = repos
            .hospital
            .get_by_correlation_id(outcome.correlation_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(clinical.id, outcome.records[&RecordKind::ClinicalSummary].id);
        assert_eq!(clinical.record.correlation_id(), Some(outcome.correlation_id));
        assert_eq!(hospital.record.correlation_id(), Some(outcome.correlation_id));
        assert_eq!(harness.total_calls(), 11);
    }

    #[tokio::test]
    async fn test_outcome_carries_summary_fields() {
        let harness = Harness::new();
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let outcome = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap();

        let hospital = &outcome.records[&RecordKind::HospitalSummary];
        assert_eq!(hospital.fields["length_of_stay_days"], json!(4));
        assert_eq!(hospital.fields["risk_level"], json!("medium"));

        let clinical = &outcome.records[&RecordKind::ClinicalSummary];
        assert_eq!(clinical.fields["primary_diagnosis"], json!("Acute coronary syndrome"));
        assert_eq!(clinical.fields["total_tests"], json!(2));
        assert_eq!(clinical.fields["critical_count"], json!(1));

        let stored_los = repos
            .hospital
            .derived_column_value(hospital.id)
            .await
            .unwrap();
        assert_eq!(stored_los, Some(4));

        let rendered = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            rendered["records"]["hospital_summary"]["length_of_stay_days"],
            json!(4)
        );
    }

    #[tokio::test]
    async fn test_correlation_ids_are_unique_across_calls() {
        let harness = Harness::new();
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let (first, second) = tokio::join!(
            handler.process("P-1", NOTE, BTreeMap::new()),
            handler.process("P-2", NOTE, BTreeMap::new()),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.correlation_id, second.correlation_id);
        for summary in first.records.values() {
            assert_eq!(summary.correlation_id, first.correlation_id);
            assert_eq!(summary.owner_id, "P-1");
        }
        for summary in second.records.values() {
            assert_eq!(summary.correlation_id, second.correlation_id);
            assert_eq!(summary.owner_id, "P-2");
        }
        assert_eq!(stored_count(&repos, "P-1").await, 2);
        assert_eq!(stored_count(&repos, "P-2").await, 2);
    }

    #[tokio::test]
    async fn test_timed_out_capability_persists_nothing() {
        let mut harness = Harness::new();
        harness.set(names::DIAGNOSIS, Script::Hang, 0);
        let repos = repositories();
        let config = ExtractorConfig {
            max_retries: 0,
            ..fast_config()
        };
        let handler = handler(&harness, &repos, config);

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();

        assert!(matches!(
            error,
            ExtractorError::Extraction {
                record: RecordKind::HospitalSummary,
                ..
            }
        ));
        assert_eq!(error.failed_capability(), Some(names::DIAGNOSIS));
        assert_eq!(stored_count(&repos, "P-1").await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_bound_attempts_and_persist_nothing() {
        let mut harness = Harness::new();
        harness.set(
            names::LABS,
            Script::Fail(CapabilityError::Transient("model overloaded".to_string())),
            0,
        );
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();

        match &error {
            ExtractorError::Extraction { record, failure } => {
                assert_eq!(*record, RecordKind::ClinicalSummary);
                assert_eq!(failure.capability, names::LABS);
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("expected extraction failure, got {other:?}"),
        }
        assert_eq!(harness.calls(names::LABS), 3);
        // Sibling aggregators still ran to completion
        assert_eq!(harness.calls(names::MEDICATION_RISK), 1);
        assert_eq!(stored_count(&repos, "P-1").await, 0);
    }

    #[tokio::test]
    async fn test_per_capability_retry_override() {
        let mut harness = Harness::new();
        harness.set(
            names::COURSE,
            Script::Fail(CapabilityError::InvalidOutput("truncated".to_string())),
            0,
        );
        let repos = repositories();
        let mut config = fast_config();
        config.capabilities.insert(
            names::COURSE.to_string(),
            crate::CapabilityOverride {
                timeout_secs: None,
                max_retries: Some(4),
            },
        );
        let handler = handler(&harness, &repos, config);

        handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();
        assert_eq!(harness.calls(names::COURSE), 5);
    }

    #[tokio::test]
    async fn test_fatal_capability_error_is_not_retried() {
        let mut harness = Harness::new();
        harness.set(
            names::FACILITY_TIMING,
            Script::Fail(CapabilityError::Fatal("model not available".to_string())),
            0,
        );
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();
        assert_eq!(error.failed_capability(), Some(names::FACILITY_TIMING));
        assert_eq!(harness.calls(names::FACILITY_TIMING), 1);
        // Discovery failed, so its consumers never started
        assert_eq!(harness.calls(names::DIAGNOSIS), 0);
        assert_eq!(harness.calls(names::MEDICATION_RISK), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_persists_nothing() {
        let mut harness = Harness::new();
        harness.set(
            names::DIAGNOSIS,
            Script::Reply(json!({"diagnosis": {"primary_diagnosis": "  "}})),
            0,
        );
        let repos = repositories();
        let handler = handler(&harness, &repos, fast_config());

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();

        assert!(matches!(error, ExtractorError::Validation(_)));
        assert!(error.to_string().contains("diagnosis.primary_diagnosis"));
        assert_eq!(stored_count(&repos, "P-1").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_runs_no_capability() {
        let harness = Harness::new();
        let repos = repositories();
        let config = ExtractorConfig {
            max_text_length: 16,
            ..fast_config()
        };
        let handler = handler(&harness, &repos, config);

        let blank_owner = handler.process(" ", NOTE, BTreeMap::new()).await;
        assert!(matches!(blank_owner, Err(ExtractorError::InvalidRequest(_))));

        let too_long = handler.process("P-1", NOTE, BTreeMap::new()).await;
        assert!(matches!(too_long, Err(ExtractorError::InvalidRequest(_))));

        assert_eq!(harness.total_calls(), 0);
    }

    #[test]
    fn test_missing_capability_fails_at_construction() {
        let harness = Harness::new();
        harness.registry.unregister(names::LABS);

        let sink: Arc<dyn CompositeSink> = repositories();
        let result = ExtractionHandler::new(
            Arc::clone(&harness.registry),
            sink,
            Gatekeeper::default(),
            fast_config(),
        );
        match result {
            Err(ExtractorError::UnknownCapability(name)) => assert_eq!(name, names::LABS),
            other => panic!("expected unknown capability, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discovery_capability_runs_before_consumers() {
        let mut harness = Harness::new();
        harness.set(
            names::FACILITY_TIMING,
            Script::Reply(good_output(names::FACILITY_TIMING)),
            30,
        );
        let aggregator = HospitalAggregator::new(harness.invoker(fast_config())).unwrap();
        let request = ExtractionRequest::new("P-1", NOTE).with_correlation_id(CorrelationId::new());

        let partials = aggregator.gather(&request).await.unwrap();

        let discovered = harness.position("end:facility_timing");
        assert!(discovered < harness.position("start:diagnosis"));
        assert!(discovered < harness.position("start:medication_risk"));
        assert_eq!(partials.encounter_id.as_deref(), Some("ENC-42"));
        assert_eq!(partials.diagnosis.encounter_id.as_deref(), Some("ENC-42"));
    }

    #[tokio::test]
    async fn test_known_encounter_id_fans_out_at_once() {
        let mut harness = Harness::new();
        harness.set(
            names::FACILITY_TIMING,
            Script::Reply(good_output(names::FACILITY_TIMING)),
            50,
        );
        let aggregator = HospitalAggregator::new(harness.invoker(fast_config())).unwrap();
        let mut metadata = BTreeMap::new();
        metadata.insert("encounter_id".to_string(), "ENC-META".to_string());
        let request = ExtractionRequest::new("P-1", NOTE).with_metadata(metadata);

        let partials = aggregator.gather(&request).await.unwrap();

        assert!(harness.position("start:diagnosis") < harness.position("end:facility_timing"));
        assert_eq!(partials.encounter_id.as_deref(), Some("ENC-META"));
        assert_eq!(
            partials.medication_risk.encounter_id.as_deref(),
            Some("ENC-META")
        );
    }

    #[tokio::test]
    async fn test_clinical_partials_are_backfilled() {
        let harness = Harness::new();
        let aggregator = ClinicalAggregator::new(harness.invoker(fast_config())).unwrap();
        let correlation_id = CorrelationId::new();
        let request = ExtractionRequest::new("P-9", NOTE).with_correlation_id(correlation_id);

        let partials = aggregator.gather(&request).await.unwrap();

        assert!(partials.presentation.is_backfilled());
        assert!(partials.history.is_backfilled());
        assert!(partials.findings.is_backfilled());
        assert!(partials.assessment.is_backfilled());
        assert!(partials.course.is_backfilled());
        assert!(partials.follow_up.is_backfilled());
        assert!(partials.treatments.is_backfilled());
        assert_eq!(partials.labs.owner_id.as_deref(), Some("P-9"));
        assert_eq!(partials.labs.correlation_id, Some(correlation_id));
        assert_eq!(partials.labs.encounter_id.as_deref(), Some("4f2a-9b01"));

        let record = aggregator.assemble(partials, &request);
        assert_eq!(record.metadata.encounter_id.as_deref(), Some("4f2a-9b01"));
        assert_eq!(record.metadata.raw_text.as_deref(), Some(NOTE));
        assert_eq!(record.summary.lab_summary.total_tests, 2);
        assert_eq!(record.summary.lab_summary.normal_count, 1);
    }

    #[tokio::test]
    async fn test_capability_lab_summary_is_not_overwritten() {
        let mut harness = Harness::new();
        harness.set(
            names::LABS,
            Script::Reply(json!({
                "lab_results": [{"test_name": "Sodium", "value": 128, "status": "abnormal_low"}],
                "lab_summary": {"total_tests": 6, "critical_count": 0, "abnormal_count": 1, "normal_count": 5}
            })),
            0,
        );
        let aggregator = ClinicalAggregator::new(harness.invoker(fast_config())).unwrap();
        let request = ExtractionRequest::new("P-1", NOTE);

        let partials = aggregator.gather(&request).await.unwrap();
        let record = aggregator.assemble(partials, &request);
        assert_eq!(record.summary.lab_summary.total_tests, 6);
        assert_eq!(record.summary.lab_summary.normal_count, 5);
    }

    #[tokio::test]
    async fn test_assessed_at_is_stamped_when_missing() {
        let harness = Harness::new();
        let aggregator = HospitalAggregator::new(harness.invoker(fast_config())).unwrap();
        let request = ExtractionRequest::new("P-1", NOTE);

        let partials = aggregator.gather(&request).await.unwrap();
        let record = aggregator.assemble(partials, &request);

        let assessed_at = record.medication_risk_assessment.assessed_at.clone().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&assessed_at).is_ok());
        assert_eq!(record.length_of_stay_days(), 4);
        assert_eq!(record.metadata.confidence_score, Some(0.8));
    }

    #[tokio::test]
    async fn test_duplicate_correlation_id_is_reported() {
        let harness = Harness::new();
        let aggregator = ClinicalAggregator::new(harness.invoker(fast_config())).unwrap();
        let request = ExtractionRequest::new("P-1", NOTE).with_correlation_id(CorrelationId::new());
        let composite = aggregator.extract(&request).await.unwrap();

        let repos = repositories();
        repos.persist(composite.clone()).await.unwrap();
        let error = repos.persist(composite).await.unwrap_err();

        assert!(error.is_duplicate());
        let error = ExtractorError::from_store(RecordKind::ClinicalSummary, error);
        assert!(error.is_duplicate());
    }

    /// Delegates to real repositories but fails every write of one kind
    struct FailingSink {
        inner: Arc<Repositories>,
        fail: RecordKind,
    }

    #[async_trait]
    impl CompositeSink for FailingSink {
        async fn persist(&self, composite: Composite) -> Result<RecordSummary, StoreError> {
            if composite.kind() == self.fail {
                return Err(StoreError::Pool("connection reset".to_string()));
            }
            self.inner.persist(composite).await
        }
    }

    #[tokio::test]
    async fn test_persist_failure_is_surfaced_and_siblings_stay_committed() {
        let harness = Harness::new();
        let repos = repositories();
        let sink = Arc::new(FailingSink {
            inner: repos.clone(),
            fail: RecordKind::HospitalSummary,
        });
        let handler = ExtractionHandler::new(
            Arc::clone(&harness.registry),
            sink,
            Gatekeeper::default(),
            fast_config(),
        )
        .unwrap();

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();

        assert!(matches!(
            error,
            ExtractorError::Persistence {
                record: RecordKind::HospitalSummary,
                ..
            }
        ));
        // No compensation: the clinical row committed in its own transaction
        assert_eq!(repos.clinical.get_by_owner("P-1", 10).await.unwrap().len(), 1);
        assert!(repos.hospital.get_by_owner("P-1", 10).await.unwrap().is_empty());
    }

    /// Aggregator whose task panics
    struct Panicking;

    #[async_trait]
    impl Aggregator for Panicking {
        fn record_kind(&self) -> RecordKind {
            RecordKind::HospitalSummary
        }

        fn capabilities(&self) -> &'static [&'static str] {
            &[]
        }

        async fn extract(&self, _request: &ExtractionRequest) -> Result<Composite, ExtractorError> {
            panic!("aggregator bug")
        }
    }

    #[tokio::test]
    async fn test_panicked_aggregator_becomes_task_error() {
        let harness = Harness::new();
        let repos = repositories();
        let clinical = ClinicalAggregator::new(harness.invoker(fast_config())).unwrap();
        let aggregators: Vec<Arc<dyn Aggregator>> = vec![Arc::new(clinical), Arc::new(Panicking)];
        let handler = ExtractionHandler::with_aggregators(
            aggregators,
            repos.clone(),
            Gatekeeper::default(),
            fast_config(),
        )
        .unwrap();

        let error = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(error, ExtractorError::Task(_)));
        assert_eq!(stored_count(&repos, "P-1").await, 0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_mock_provider() {
        let mut provider = MockProvider::default().with_model("llama3.1:8b");
        for definition in &catalog::CATALOG {
            provider.add_response(
                format!("[{}]", definition.name),
                good_output(definition.name).to_string(),
            );
        }
        let registry = Arc::new(CapabilityRegistry::new());
        catalog::register_all(&registry, Arc::new(provider.clone()), None);

        let repos = repositories();
        let handler = ExtractionHandler::new(
            registry,
            repos.clone(),
            Gatekeeper::default(),
            fast_config(),
        )
        .unwrap();

        let outcome = handler.process("P-1", NOTE, BTreeMap::new()).await.unwrap();

        assert_eq!(provider.call_count(), 11);
        let hospital = repos
            .hospital
            .get_by_correlation_id(outcome.correlation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hospital.record.diagnosis.primary_diagnosis, "NSTEMI");
        assert_eq!(hospital.record.metadata.encounter_id.as_deref(), Some("ENC-42"));
        assert_eq!(
            hospital.record.metadata.model_version.as_deref(),
            Some("llama3.1:8b")
        );
    }
}
