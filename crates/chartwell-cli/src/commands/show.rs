//! Show command implementation.

use crate::cli::{RecordKindArg, ShowArgs};
use crate::error::{CliError, Result};
use crate::output::{Formatter, RecordRow};
use chartwell_domain::{CorrelationId, RecordId};
use chartwell_store::{Repositories, Repository, StoredRecord};

/// Execute the show command.
pub async fn execute_show(
    args: ShowArgs,
    repositories: &Repositories,
    formatter: &Formatter,
) -> Result<()> {
    let rows = match args.kind {
        RecordKindArg::Clinical => fetch(&repositories.clinical, &args).await?,
        RecordKindArg::Hospital => fetch(&repositories.hospital, &args).await?,
    };
    println!("{}", formatter.format_records(&rows)?);
    Ok(())
}

/// Rows selected by exactly one of `--id`, `--correlation-id` or `--owner`.
///
/// Single-record lookups that match nothing are errors; an owner with no
/// records yields an empty list.
pub async fn fetch<R: StoredRecord>(repository: &Repository<R>, args: &ShowArgs) -> Result<Vec<RecordRow>> {
    let records = if let Some(id) = &args.id {
        let id: RecordId = id
            .parse()
            .map_err(|e: chartwell_domain::IdParseError| CliError::InvalidInput(e.to_string()))?;
        let record = repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| CliError::NotFound(format!("{} {id}", R::KIND)))?;
        vec![record]
    } else if let Some(correlation_id) = &args.correlation_id {
        let correlation_id: CorrelationId = correlation_id
            .parse()
            .map_err(|e: chartwell_domain::IdParseError| CliError::InvalidInput(e.to_string()))?;
        let record = repository
            .get_by_correlation_id(correlation_id)
            .await?
            .ok_or_else(|| {
                CliError::NotFound(format!("{} with correlation id {correlation_id}", R::KIND))
            })?;
        vec![record]
    } else if let Some(owner) = &args.owner {
        repository.get_by_owner(owner, args.limit).await?
    } else {
        return Err(CliError::InvalidInput(
            "one of --id, --correlation-id or --owner is required".to_string(),
        ));
    };

    records.iter().map(RecordRow::from_persisted).collect()
}
