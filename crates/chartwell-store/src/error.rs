//! Storage errors

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No session could be acquired from the pool
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Payload could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored payload was written for a different schema or version
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Schema tag this build reads
        expected: String,
        /// Schema tag found in the stored envelope
        found: String,
    },

    /// A uniqueness constraint was violated
    #[error("Duplicate {field} in {table}: {value}")]
    Duplicate {
        /// Table the insert targeted
        table: &'static str,
        /// Column whose uniqueness was violated
        field: String,
        /// Offending value
        value: String,
    },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Blocking database task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether this error is a uniqueness violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// Message of a UNIQUE or PRIMARY KEY constraint violation, if `error` is one
pub(crate) fn unique_violation(error: &rusqlite::Error) -> Option<&str> {
    match error {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            Some(message.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}
