//! CLI command definitions and argument parsing.

use chartwell_domain::RecordKind;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Chartwell CLI - Extract structured records from clinical documents.
#[derive(Debug, Parser)]
#[command(name = "chartwell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CHARTWELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true, env = "CHARTWELL_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and persist every record from one document
    Process(ProcessArgs),

    /// Process every matching document in a directory
    Batch(BatchArgs),

    /// Show stored records
    Show(ShowArgs),

    /// List registered capabilities
    Capabilities,
}

/// Arguments for the process command.
#[derive(Debug, Parser)]
pub struct ProcessArgs {
    /// Owner (patient) identifier
    #[arg(short, long)]
    pub owner: String,

    /// Document to read
    #[arg(long, conflicts_with = "stdin")]
    pub file: Option<PathBuf>,

    /// Read the document from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Request metadata (format: key=value), e.g. encounter_id=ENC-42
    #[arg(short, long = "meta", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,
}

/// Arguments for the batch command.
#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// Owner (patient) identifier applied to every document
    #[arg(short, long)]
    pub owner: String,

    /// Directory holding the documents
    #[arg(short, long)]
    pub dir: PathBuf,

    /// Only files with this extension are processed
    #[arg(short, long, default_value = "txt")]
    pub extension: String,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
#[command(group(
    ArgGroup::new("selector")
        .required(true)
        .args(["id", "correlation_id", "owner"])
))]
pub struct ShowArgs {
    /// Record type
    #[arg(value_enum)]
    pub kind: RecordKindArg,

    /// Record identifier
    #[arg(long)]
    pub id: Option<String>,

    /// Correlation identifier shared by one document's records
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Owner identifier
    #[arg(long)]
    pub owner: Option<String>,

    /// Maximum number of results for --owner
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

/// Record type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordKindArg {
    /// Clinical summaries
    Clinical,
    /// Hospital admission summaries
    Hospital,
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("invalid metadata '{input}', expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid metadata '{input}', key is empty"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<RecordKindArg> for RecordKind {
    fn from(kind: RecordKindArg) -> Self {
        match kind {
            RecordKindArg::Clinical => RecordKind::ClinicalSummary,
            RecordKindArg::Hospital => RecordKind::HospitalSummary,
        }
    }
}
