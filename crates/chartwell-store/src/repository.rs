//! Per-record-type CRUD
//!
//! Every method runs in its own transaction on its own pooled session. A
//! failing method rolls its transaction back before the error is returned.

use crate::bridge::StoredRecord;
use crate::error::unique_violation;
use crate::{SessionManager, StoreError};
use chartwell_domain::{
    ClinicalSummaryRecord, CompositeRecord, CorrelationId, HospitalSummaryRecord, PersistedRecord,
    RecordId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::marker::PhantomData;

const SELECT_COLUMNS: &str = "id, owner_id, correlation_id, payload, created_at";

/// Changes applied by [`Repository::update`]
///
/// The correlation id of a stored row never changes; a replacement record
/// inherits it.
#[derive(Debug, Clone)]
pub struct RecordPatch<R> {
    /// New owner identifier
    pub owner_id: Option<String>,
    /// Replacement composite
    pub record: Option<R>,
}

impl<R> Default for RecordPatch<R> {
    fn default() -> Self {
        Self {
            owner_id: None,
            record: None,
        }
    }
}

impl<R> RecordPatch<R> {
    /// Change only the owner
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            record: None,
        }
    }

    /// Replace only the composite
    pub fn record(record: R) -> Self {
        Self {
            owner_id: None,
            record: Some(record),
        }
    }
}

/// Row as read from SQLite, before decoding
struct RawRow {
    id: String,
    owner_id: String,
    correlation_id: String,
    payload: String,
    created_at: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            correlation_id: row.get(2)?,
            payload: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode<R: StoredRecord>(self) -> Result<PersistedRecord<R>, StoreError> {
        let id = self
            .id
            .parse::<RecordId>()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let correlation_id = self
            .correlation_id
            .parse::<CorrelationId>()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::InvalidData(format!("created_at {:?}: {}", self.created_at, e)))?
            .with_timezone(&Utc);

        Ok(PersistedRecord {
            id,
            owner_id: self.owner_id,
            correlation_id,
            created_at,
            record: R::PAYLOAD.decode(&self.payload)?,
        })
    }
}

/// Timestamps are stored with fixed nanosecond precision so text order is time order
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn fetch_by_id<R: StoredRecord>(
    tx: &Transaction<'_>,
    id: &str,
) -> Result<Option<RawRow>, StoreError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?1", R::TABLE);
    Ok(tx.query_row(&sql, params![id], RawRow::read).optional()?)
}

fn map_insert_error(table: &'static str, id: &str, correlation_id: &str, error: rusqlite::Error) -> StoreError {
    match unique_violation(&error) {
        Some(message) => {
            let field = message
                .rsplit('.')
                .next()
                .filter(|field| !field.is_empty())
                .unwrap_or("correlation_id")
                .to_string();
            let value = if field == "id" { id } else { correlation_id };
            StoreError::Duplicate {
                table,
                field,
                value: value.to_string(),
            }
        }
        None => StoreError::Database(error),
    }
}

/// CRUD over one record type's table
pub struct Repository<R> {
    sessions: SessionManager,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("record", &std::any::type_name::<R>())
            .finish()
    }
}

impl<R: StoredRecord> Repository<R> {
    /// Repository on a shared session pool
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            _record: PhantomData,
        }
    }

    /// Insert a new row
    ///
    /// The record must already carry its correlation id. Fails with
    /// [`StoreError::Duplicate`] when a row with the same correlation id exists.
    pub async fn create(
        &self,
        owner_id: &str,
        mut record: R,
    ) -> Result<PersistedRecord<R>, StoreError> {
        let correlation_id = record.correlation_id().ok_or_else(|| {
            StoreError::InvalidData(format!("{} record has no correlation id", R::TABLE))
        })?;
        record.metadata_mut().owner_id = owner_id.to_string();

        let id = RecordId::new();
        let created_at = Utc::now();
        let payload = R::PAYLOAD.encode(&record)?;
        let derived = record.derived_value();

        let (id_text, owner_text, correlation_text, created_text) = (
            id.to_string(),
            owner_id.to_string(),
            correlation_id.to_string(),
            format_timestamp(created_at),
        );

        self.sessions
            .transaction(move |tx| {
                let result = match R::DERIVED_COLUMN {
                    Some(column) => tx.execute(
                        &format!(
                            "INSERT INTO {} (id, owner_id, correlation_id, payload, {column}, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            R::TABLE
                        ),
                        params![
                            id_text,
                            owner_text,
                            correlation_text,
                            payload,
                            derived.unwrap_or(0),
                            created_text
                        ],
                    ),
                    None => tx.execute(
                        &format!(
                            "INSERT INTO {} (id, owner_id, correlation_id, payload, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)",
                            R::TABLE
                        ),
                        params![id_text, owner_text, correlation_text, payload, created_text],
                    ),
                };
                result.map_err(|e| map_insert_error(R::TABLE, &id_text, &correlation_text, e))?;
                Ok(())
            })
            .await?;

        tracing::debug!(table = R::TABLE, %id, %correlation_id, "Created record");

        Ok(PersistedRecord {
            id,
            owner_id: owner_id.to_string(),
            correlation_id,
            created_at,
            record,
        })
    }

    /// Fetch one row by primary key
    pub async fn get_by_id(&self, id: RecordId) -> Result<Option<PersistedRecord<R>>, StoreError> {
        let id = id.to_string();
        self.sessions
            .transaction(move |tx| fetch_by_id::<R>(tx, &id)?.map(RawRow::decode::<R>).transpose())
            .await
    }

    /// Fetch the row produced by one request
    pub async fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<PersistedRecord<R>>, StoreError> {
        let correlation_id = correlation_id.to_string();
        self.sessions
            .transaction(move |tx| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM {} WHERE correlation_id = ?1",
                    R::TABLE
                );
                tx.query_row(&sql, params![correlation_id], RawRow::read)
                    .optional()?
                    .map(RawRow::decode::<R>)
                    .transpose()
            })
            .await
    }

    /// Newest rows for one owner, at most `limit`
    pub async fn get_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<PersistedRecord<R>>, StoreError> {
        let owner_id = owner_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.sessions
            .transaction(move |tx| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM {} WHERE owner_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2",
                    R::TABLE
                );
                let mut stmt = tx.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![owner_id, limit], RawRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(RawRow::decode::<R>).collect()
            })
            .await
    }

    /// Apply a patch to an existing row
    ///
    /// Returns `None` when no row has this id. Derived columns are recomputed
    /// from the patched payload.
    pub async fn update(
        &self,
        id: RecordId,
        patch: RecordPatch<R>,
    ) -> Result<Option<PersistedRecord<R>>, StoreError> {
        let id_text = id.to_string();
        let updated = self
            .sessions
            .transaction(move |tx| {
                let Some(existing) = fetch_by_id::<R>(tx, &id_text)? else {
                    return Ok(None);
                };
                let existing = existing.decode::<R>()?;

                let owner_id = patch.owner_id.unwrap_or(existing.owner_id);
                let mut record = patch.record.unwrap_or(existing.record);
                record.set_correlation_id(existing.correlation_id);
                record.metadata_mut().owner_id = owner_id.clone();

                let payload = R::PAYLOAD.encode(&record)?;
                match R::DERIVED_COLUMN {
                    Some(column) => tx.execute(
                        &format!(
                            "UPDATE {} SET owner_id = ?1, payload = ?2, {column} = ?3 WHERE id = ?4",
                            R::TABLE
                        ),
                        params![owner_id, payload, record.derived_value().unwrap_or(0), id_text],
                    )?,
                    None => tx.execute(
                        &format!("UPDATE {} SET owner_id = ?1, payload = ?2 WHERE id = ?3", R::TABLE),
                        params![owner_id, payload, id_text],
                    )?,
                };

                Ok(Some(PersistedRecord {
                    id: existing.id,
                    owner_id,
                    correlation_id: existing.correlation_id,
                    created_at: existing.created_at,
                    record,
                }))
            })
            .await?;

        if updated.is_some() {
            tracing::debug!(table = R::TABLE, %id, "Updated record");
        }
        Ok(updated)
    }

    /// Remove a row; `false` when it did not exist
    pub async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let id_text = id.to_string();
        let deleted = self
            .sessions
            .transaction(move |tx| {
                let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);
                Ok(tx.execute(&sql, params![id_text])? > 0)
            })
            .await?;

        if deleted {
            tracing::debug!(table = R::TABLE, %id, "Deleted record");
        }
        Ok(deleted)
    }

    /// Stored derived column value, for checking it against the payload
    pub async fn derived_column_value(&self, id: RecordId) -> Result<Option<i64>, StoreError> {
        let Some(column) = R::DERIVED_COLUMN else {
            return Ok(None);
        };
        let id = id.to_string();
        self.sessions
            .transaction(move |tx| {
                let sql = format!("SELECT {column} FROM {} WHERE id = ?1", R::TABLE);
                Ok(tx.query_row(&sql, params![id], |row| row.get(0)).optional()?)
            })
            .await
    }
}

/// One repository per record type, sharing a session pool
#[derive(Debug, Clone)]
pub struct Repositories {
    /// Clinical summaries
    pub clinical: Repository<ClinicalSummaryRecord>,
    /// Hospital admission summaries
    pub hospital: Repository<HospitalSummaryRecord>,
}

impl Repositories {
    /// Repositories over `sessions`
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            clinical: Repository::new(sessions.clone()),
            hospital: Repository::new(sessions),
        }
    }
}
