//! Batch command implementation.

use crate::cli::BatchArgs;
use crate::error::{CliError, Result};
use crate::output::{BatchEntry, Formatter};
use chartwell_extractor::ExtractionHandler;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Execute the batch command.
///
/// Every document is attempted; the command fails afterwards if any of
/// them did.
pub async fn execute_batch(
    args: BatchArgs,
    handler: &ExtractionHandler,
    formatter: &Formatter,
) -> Result<()> {
    let entries = run_batch(handler, &args.owner, &args.dir, &args.extension).await?;
    println!("{}", formatter.format_batch(&entries)?);

    let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
    if failed > 0 {
        return Err(CliError::BatchFailed {
            failed,
            total: entries.len(),
        });
    }
    Ok(())
}

/// Files in `dir` with `extension`, sorted by name.
pub fn list_documents(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process each document in turn, recording every outcome.
pub async fn run_batch(
    handler: &ExtractionHandler,
    owner: &str,
    dir: &Path,
    extension: &str,
) -> Result<Vec<BatchEntry>> {
    let files = list_documents(dir, extension)?;
    info!(dir = %dir.display(), documents = files.len(), "Starting batch");

    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let outcome = match fs::read_to_string(&file) {
            Ok(text) => {
                let mut metadata = BTreeMap::new();
                metadata.insert("source".to_string(), file.display().to_string());
                handler
                    .process(owner, &text, metadata)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("could not read file: {e}")),
        };
        if let Err(error) = &outcome {
            warn!(file = %file.display(), %error, "Document failed");
        }
        entries.push(BatchEntry { file, outcome });
    }

    let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
    info!(documents = entries.len(), failed, "Batch finished");
    Ok(entries)
}
