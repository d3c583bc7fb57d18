//! Chartwell Extractor
//!
//! Turns one clinical document into persisted structured records.
//!
//! # Overview
//!
//! Extraction is split into small named *capabilities*, each mapping raw
//! text to one typed section (labs, diagnosis, admission timing, ...). A
//! *domain aggregator* per record kind fans out to its capabilities, joins
//! on all of them and assembles a composite record. The *orchestration
//! handler* runs every aggregator for a document, stamps one correlation id
//! on all composites, validates them and persists them.
//!
//! # Architecture
//!
//! ```text
//! Text → ExtractionHandler → [Aggregator × M] → [CapabilityInvoker × N] → LLM
//!                          → Gatekeeper → Repositories
//! ```
//!
//! # Key Features
//!
//! - **Capability Registry**: explicit name → capability map, checked at startup
//! - **Bounded Retries**: per-attempt timeout, at most `max_retries + 1` attempts
//! - **Identifier Discovery**: discovery capabilities run before consumers
//! - **All-or-Nothing Extraction**: no record is written unless every capability succeeded
//!
//! # Example Usage
//!
//! ```no_run
//! use chartwell_extractor::{catalog, CapabilityRegistry, ExtractionHandler, ExtractorConfig};
//! use chartwell_gatekeeper::Gatekeeper;
//! use chartwell_llm::MockProvider;
//! use chartwell_store::{Repositories, SessionManager, StoreConfig};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(CapabilityRegistry::new());
//! catalog::register_all(&registry, Arc::new(MockProvider::default()), None);
//!
//! let sessions = SessionManager::open(&StoreConfig::in_memory())?;
//! let handler = ExtractionHandler::new(
//!     registry,
//!     Arc::new(Repositories::new(sessions)),
//!     Gatekeeper::default(),
//!     ExtractorConfig::default(),
//! )?;
//!
//! let outcome = handler
//!     .process("P-1", "Chief complaint: chest pain ...", BTreeMap::new())
//!     .await?;
//! println!("correlation id: {}", outcome.correlation_id);
//! for (kind, record) in &outcome.records {
//!     println!("{kind}: {}", record.id);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod capability;
mod config;
mod error;
mod handler;
mod invoker;
mod parser;
mod prompt;
mod registry;

pub mod aggregator;
pub mod catalog;

#[cfg(test)]
mod tests;

pub use aggregator::{Aggregator, ClinicalAggregator, HospitalAggregator};
pub use capability::{Capability, LlmCapability};
pub use config::{CapabilityOverride, ExtractorConfig, InvocationPolicy};
pub use error::{CapabilityError, ExtractionFailure, ExtractorError};
pub use handler::{CompositeSink, ExtractionHandler, ProcessOutcome, RecordSummary};
pub use invoker::{invoke, CapabilityInvoker};
pub use parser::parse_object;
pub use prompt::{Prompt, PromptBuilder};
pub use registry::{CapabilityInfo, CapabilityRegistry};
