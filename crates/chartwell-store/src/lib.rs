//! Chartwell Storage Layer
//!
//! Persists composite records in SQLite.
//!
//! # Architecture
//!
//! - [`SessionManager`]: fixed pool of connections with RAII release
//! - [`PayloadColumn`]: schema-versioned JSON envelope bound once per record type
//! - [`Repository`]: create / get / update / delete, one transaction per call
//!
//! One table per record type. The composite lives in a single `payload`
//! column; owner, correlation id and any derived column sit beside it for
//! querying. The correlation id column is UNIQUE, and a second insert with
//! the same id fails with [`StoreError::Duplicate`].
//!
//! # Examples
//!
//! ```no_run
//! use chartwell_store::{Repositories, SessionManager, StoreConfig};
//!
//! let sessions = SessionManager::open(&StoreConfig::file("chartwell.db")).unwrap();
//! let repositories = Repositories::new(sessions);
//! ```

#![warn(missing_docs)]

pub mod bridge;
mod error;
pub mod repository;
pub mod session;

pub use bridge::{PayloadColumn, StoredRecord};
pub use error::StoreError;
pub use repository::{RecordPatch, Repositories, Repository};
pub use session::{Session, SessionManager, StoreConfig, IN_MEMORY};
