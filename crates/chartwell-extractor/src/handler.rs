//! Orchestration handler
//!
//! Processes one document for one owner:
//!
//! ```text
//! request → [aggregator × M, concurrent] → inject correlation id
//!         → validate all → [persist × M, concurrent] → ProcessOutcome
//! ```
//!
//! Extraction and validation are all-or-nothing: nothing is written unless
//! every aggregator succeeded and every composite passed the gatekeeper.
//! Persistence runs one transaction per record kind. When one of them fails,
//! rows already committed by its siblings stay in place; they are logged
//! with the shared correlation id.

use crate::aggregator::{Aggregator, ClinicalAggregator, HospitalAggregator};
use crate::{CapabilityInvoker, CapabilityRegistry, ExtractorConfig, ExtractorError};
use async_trait::async_trait;
use chartwell_domain::{
    Composite, CompositeRecord, CorrelationId, ExtractionRequest, PersistedRecord, RecordId,
    RecordKind,
};
use chartwell_gatekeeper::Gatekeeper;
use chartwell_store::{Repositories, StoreError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// What the caller gets back for one stored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    /// Storage identifier
    pub id: RecordId,
    /// Owner identifier
    pub owner_id: String,
    /// Correlation identifier shared with sibling records
    pub correlation_id: CorrelationId,
    /// Record-specific summary fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RecordSummary {
    /// Summarize a freshly persisted record
    pub fn from_persisted<R: CompositeRecord>(persisted: &PersistedRecord<R>) -> Self {
        Self {
            id: persisted.id,
            owner_id: persisted.owner_id.clone(),
            correlation_id: persisted.correlation_id,
            fields: persisted.record.summary_fields(),
        }
    }
}

/// Result of one successful `process` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    /// Correlation identifier carried by every record below
    pub correlation_id: CorrelationId,
    /// One summary per record kind
    pub records: BTreeMap<RecordKind, RecordSummary>,
}

/// Where assembled composites are written
#[async_trait]
pub trait CompositeSink: Send + Sync {
    /// Persist one composite in its own transaction
    async fn persist(&self, composite: Composite) -> Result<RecordSummary, StoreError>;
}

#[async_trait]
impl CompositeSink for Repositories {
    async fn persist(&self, composite: Composite) -> Result<RecordSummary, StoreError> {
        let owner_id = composite.owner_id().to_string();
        match composite {
            Composite::Clinical(record) => self
                .clinical
                .create(&owner_id, *record)
                .await
                .map(|persisted| RecordSummary::from_persisted(&persisted)),
            Composite::Hospital(record) => self
                .hospital
                .create(&owner_id, *record)
                .await
                .map(|persisted| RecordSummary::from_persisted(&persisted)),
        }
    }
}

/// Top-level coordinator for one incoming document
#[derive(Clone)]
pub struct ExtractionHandler {
    aggregators: Vec<Arc<dyn Aggregator>>,
    sink: Arc<dyn CompositeSink>,
    gatekeeper: Gatekeeper,
    config: Arc<ExtractorConfig>,
}

impl std::fmt::Debug for ExtractionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionHandler")
            .field("record_kinds", &self.record_kinds())
            .field("gatekeeper", &self.gatekeeper)
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionHandler {
    /// Handler running the clinical and hospital aggregators
    ///
    /// Fails with [`ExtractorError::UnknownCapability`] when the registry
    /// lacks a capability either aggregator needs.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        sink: Arc<dyn CompositeSink>,
        gatekeeper: Gatekeeper,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate()?;
        let config = Arc::new(config);
        let invoker = CapabilityInvoker::new(registry, Arc::clone(&config));

        let aggregators: Vec<Arc<dyn Aggregator>> = vec![
            Arc::new(ClinicalAggregator::new(invoker.clone())?),
            Arc::new(HospitalAggregator::new(invoker)?),
        ];

        Ok(Self {
            aggregators,
            sink,
            gatekeeper,
            config,
        })
    }

    /// Handler over an explicit aggregator set
    pub fn with_aggregators(
        aggregators: Vec<Arc<dyn Aggregator>>,
        sink: Arc<dyn CompositeSink>,
        gatekeeper: Gatekeeper,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate()?;
        Ok(Self {
            aggregators,
            sink,
            gatekeeper,
            config: Arc::new(config),
        })
    }

    /// Record kinds produced per document
    pub fn record_kinds(&self) -> Vec<RecordKind> {
        self.aggregators.iter().map(|a| a.record_kind()).collect()
    }

    /// Process one document for one owner
    pub async fn process(
        &self,
        owner_id: &str,
        text: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<ProcessOutcome, ExtractorError> {
        let correlation_id = CorrelationId::new();
        let request = ExtractionRequest::new(owner_id, text)
            .with_metadata(metadata)
            .with_correlation_id(correlation_id);
        request.check(self.config.max_text_length)?;

        info!(
            %correlation_id,
            owner_id,
            text_len = text.len(),
            aggregators = self.aggregators.len(),
            "Processing document"
        );

        let mut composites = self.extract_all(&request).await.map_err(|e| {
            error!(%correlation_id, error = %e, "Extraction failed, nothing persisted");
            e
        })?;

        for composite in &mut composites {
            composite.set_correlation_id(correlation_id);
        }

        for composite in &composites {
            self.gatekeeper
                .validate_composite(composite)
                .into_result(composite.kind().as_str())
                .map_err(|e| {
                    error!(%correlation_id, error = %e, "Validation failed, nothing persisted");
                    ExtractorError::Validation(e)
                })?;
        }

        let records = self.persist_all(correlation_id, composites).await?;

        info!(%correlation_id, records = records.len(), "Document processed");
        Ok(ProcessOutcome {
            correlation_id,
            records,
        })
    }

    /// Run every aggregator concurrently and join on all of them
    ///
    /// Sibling tasks are not cancelled when one fails; their results are
    /// awaited and dropped. The first failure observed is returned.
    async fn extract_all(&self, request: &ExtractionRequest) -> Result<Vec<Composite>, ExtractorError> {
        let mut tasks = JoinSet::new();
        for aggregator in &self.aggregators {
            let aggregator = Arc::clone(aggregator);
            let request = request.clone();
            tasks.spawn(async move {
                let kind = aggregator.record_kind();
                (kind, aggregator.extract(&request).await)
            });
        }

        let mut composites = Vec::with_capacity(self.aggregators.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((_, Ok(composite))) => Ok(composite),
                Ok((kind, Err(e))) => {
                    warn!(record = %kind, error = %e, "Aggregator failed");
                    Err(e)
                }
                Err(e) => Err(ExtractorError::Task(e.to_string())),
            };
            match outcome {
                Ok(composite) => composites.push(composite),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                composites.sort_by_key(Composite::kind);
                Ok(composites)
            }
        }
    }

    /// Persist every composite concurrently, one transaction each
    async fn persist_all(
        &self,
        correlation_id: CorrelationId,
        composites: Vec<Composite>,
    ) -> Result<BTreeMap<RecordKind, RecordSummary>, ExtractorError> {
        let mut tasks = JoinSet::new();
        for composite in composites {
            let sink = Arc::clone(&self.sink);
            tasks.spawn(async move {
                let kind = composite.kind();
                (kind, sink.persist(composite).await)
            });
        }

        let mut records = BTreeMap::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, Ok(summary))) => {
                    records.insert(kind, summary);
                }
                Ok((kind, Err(e))) => {
                    error!(%correlation_id, record = %kind, error = %e, "Persist failed");
                    first_error.get_or_insert(ExtractorError::from_store(kind, e));
                }
                Err(e) => {
                    first_error.get_or_insert(ExtractorError::Task(e.to_string()));
                }
            }
        }

        if let Some(e) = first_error {
            for (kind, summary) in &records {
                warn!(
                    %correlation_id,
                    record = %kind,
                    id = %summary.id,
                    "Record stays committed after a sibling persist failed"
                );
            }
            return Err(e);
        }
        Ok(records)
    }
}
