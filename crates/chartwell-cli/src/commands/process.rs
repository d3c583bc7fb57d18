//! Process command implementation.

use crate::cli::ProcessArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use chartwell_extractor::ExtractionHandler;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};

/// Execute the process command.
pub async fn execute_process(
    args: ProcessArgs,
    handler: &ExtractionHandler,
    formatter: &Formatter,
) -> Result<()> {
    let text = if args.stdin {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else if let Some(file_path) = &args.file {
        fs::read_to_string(file_path)?
    } else {
        return Err(CliError::InvalidInput(
            "Must specify either --file or --stdin".to_string(),
        ));
    };

    let mut metadata: BTreeMap<String, String> = args.metadata.into_iter().collect();
    if let Some(file_path) = &args.file {
        metadata
            .entry("source".to_string())
            .or_insert_with(|| file_path.display().to_string());
    }

    let outcome = handler.process(&args.owner, &text, metadata).await?;
    println!("{}", formatter.format_outcome(&outcome)?);

    Ok(())
}
