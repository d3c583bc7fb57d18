//! Pooled SQLite sessions
//!
//! A fixed set of connections is opened up front. Each logical operation
//! checks one out for its duration; the [`Session`] guard hands it back when
//! dropped, whether the operation succeeded, failed, or was cancelled.

use crate::StoreError;
use rusqlite::{Connection, Transaction};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Path that selects a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = include_str!("schema.sql");

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// Number of pooled connections (forced to 1 for in-memory databases)
    pub pool_size: usize,
    /// How long a connection waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chartwell.db"),
            pool_size: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Configuration for a file database with default pool settings
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY),
            pool_size: 1,
            ..Default::default()
        }
    }

    /// Whether this configuration targets an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY
    }

    fn effective_pool_size(&self) -> usize {
        // Each in-memory connection would be its own database
        if self.is_in_memory() {
            1
        } else {
            self.pool_size.max(1)
        }
    }
}

struct Pool {
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

/// Hands out pooled connections
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct SessionManager {
    pool: Arc<Pool>,
    size: usize,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("size", &self.size)
            .field("available", &self.available())
            .finish()
    }
}

impl SessionManager {
    /// Open the pool and bootstrap the schema
    ///
    /// # Examples
    ///
    /// ```
    /// use chartwell_store::{SessionManager, StoreConfig};
    ///
    /// let sessions = SessionManager::open(&StoreConfig::in_memory()).unwrap();
    /// assert_eq!(sessions.size(), 1);
    /// ```
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let size = config.effective_pool_size();
        let mut connections = Vec::with_capacity(size);

        for index in 0..size {
            let conn = Self::open_connection(config)?;
            if index == 0 {
                conn.execute_batch(SCHEMA)?;
            }
            connections.push(conn);
        }

        tracing::info!(
            path = %config.path.display(),
            pool_size = size,
            "Opened session pool"
        );

        Ok(Self {
            pool: Arc::new(Pool {
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(size)),
            }),
            size,
        })
    }

    fn open_connection(config: &StoreConfig) -> Result<Connection, StoreError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if config.is_in_memory() {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        } else {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        }
        Ok(conn)
    }

    /// Total number of pooled connections
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections not currently checked out
    pub fn available(&self) -> usize {
        self.pool.permits.available_permits()
    }

    /// Check out a connection, waiting until one is free
    pub async fn acquire(&self) -> Result<Session, StoreError> {
        let permit = Arc::clone(&self.pool.permits)
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let conn = self
            .pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| StoreError::Pool("no idle connection behind permit".to_string()))?;

        Ok(Session {
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
            _permit: permit,
        })
    }

    /// Run blocking database work on a checked-out connection
    ///
    /// The closure runs on the blocking thread pool. The session is released
    /// when the closure returns, even if the awaiting task is cancelled first.
    pub async fn run<F, T>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let mut session = self.acquire().await?;
        tokio::task::spawn_blocking(move || session.with_connection(work))
            .await
            .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }

    /// Run `work` inside one transaction
    ///
    /// Commits when `work` succeeds. Rolls back before returning the error
    /// otherwise.
    pub async fn transaction<F, T>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            match work(&tx) {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(error) => {
                    if let Err(rollback_error) = tx.rollback() {
                        tracing::warn!(error = %rollback_error, "Rollback failed");
                    }
                    Err(error)
                }
            }
        })
        .await
    }
}

/// A checked-out connection
///
/// Returns the connection to the pool on drop.
pub struct Session {
    conn: Option<Connection>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    /// Run `work` against the connection
    pub fn with_connection<F, T>(&mut self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        match self.conn.as_mut() {
            Some(conn) => work(conn),
            None => Err(StoreError::Pool("session already released".to_string())),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conn);
        }
        // The permit is released after this, once the connection is back
    }
}
