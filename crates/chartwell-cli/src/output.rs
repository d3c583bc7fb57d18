//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use chartwell_domain::{CompositeRecord, PersistedRecord, RecordKind};
use chartwell_extractor::{CapabilityInfo, ProcessOutcome};
use colored::*;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// One stored record, flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    /// Record type
    pub kind: RecordKind,
    /// Record identifier
    pub id: String,
    /// Owner identifier
    pub owner_id: String,
    /// Correlation identifier
    pub correlation_id: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Summary fields
    pub summary: Map<String, Value>,
    /// Full composite
    pub record: Value,
}

impl RecordRow {
    /// Flatten a stored record.
    pub fn from_persisted<R: CompositeRecord>(persisted: &PersistedRecord<R>) -> Result<Self> {
        Ok(Self {
            kind: R::KIND,
            id: persisted.id.to_string(),
            owner_id: persisted.owner_id.clone(),
            correlation_id: persisted.correlation_id.to_string(),
            created_at: persisted.created_at.to_rfc3339(),
            summary: persisted.record.summary_fields(),
            record: serde_json::to_value(&persisted.record)?,
        })
    }
}

/// Outcome of one document in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// Document path
    pub file: PathBuf,
    /// Processing outcome, or the error message
    pub outcome: std::result::Result<ProcessOutcome, String>,
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the outcome of one `process` call.
    pub fn format_outcome(&self, outcome: &ProcessOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
            OutputFormat::Quiet => Ok(outcome.correlation_id.to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Record", "ID", "Summary"]);
                for (kind, summary) in &outcome.records {
                    builder.push_record([
                        kind.to_string(),
                        summary.id.to_string(),
                        summary_line(&summary.fields),
                    ]);
                }
                Ok(format!(
                    "{}\n{}",
                    self.success(&format!("Correlation ID: {}", outcome.correlation_id)),
                    self.table(builder)
                ))
            }
        }
    }

    /// Format stored records.
    pub fn format_records(&self, rows: &[RecordRow]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json_rows: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        json!({
                            "kind": row.kind,
                            "id": row.id,
                            "owner_id": row.owner_id,
                            "correlation_id": row.correlation_id,
                            "created_at": row.created_at,
                            "record": row.record,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json_rows)?)
            }
            OutputFormat::Quiet => Ok(rows
                .iter()
                .map(|row| row.id.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if rows.is_empty() {
                    return Ok(self.colorize("No records found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["ID", "Owner", "Correlation ID", "Created", "Summary"]);
                for row in rows {
                    builder.push_record([
                        short_id(&row.id).to_string(),
                        row.owner_id.clone(),
                        row.correlation_id.clone(),
                        row.created_at.clone(),
                        summary_line(&row.summary),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format the registered capabilities.
    pub fn format_capabilities(&self, capabilities: &[CapabilityInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json_caps: Vec<Value> = capabilities
                    .iter()
                    .map(|info| {
                        json!({
                            "name": info.name,
                            "record_kind": info.record_kind,
                            "output_schema": info.output_schema,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json_caps)?)
            }
            OutputFormat::Quiet => Ok(capabilities
                .iter()
                .map(|info| info.name.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Capability", "Record", "Output Schema"]);
                for info in capabilities {
                    builder.push_record([
                        info.name.clone(),
                        info.record_kind.to_string(),
                        info.output_schema.clone(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format a batch report.
    pub fn format_batch(&self, entries: &[BatchEntry]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json_entries: Vec<Value> = entries
                    .iter()
                    .map(|entry| match &entry.outcome {
                        Ok(outcome) => json!({
                            "file": entry.file.display().to_string(),
                            "status": "ok",
                            "outcome": outcome,
                        }),
                        Err(error) => json!({
                            "file": entry.file.display().to_string(),
                            "status": "failed",
                            "error": error,
                        }),
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json_entries)?)
            }
            OutputFormat::Quiet => Ok(entries
                .iter()
                .filter_map(|entry| entry.outcome.as_ref().ok())
                .map(|outcome| outcome.correlation_id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if entries.is_empty() {
                    return Ok(self.colorize("No documents found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["File", "Status", "Correlation ID / Error"]);
                for entry in entries {
                    let file = entry.file.display().to_string();
                    match &entry.outcome {
                        Ok(outcome) => builder.push_record([
                            file,
                            self.colorize("ok", "green"),
                            outcome.correlation_id.to_string(),
                        ]),
                        Err(error) => {
                            builder.push_record([file, self.colorize("failed", "red"), error.clone()])
                        }
                    }
                }

                let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
                let footer = if failed == 0 {
                    self.success(&format!("Processed {} document(s)", entries.len()))
                } else {
                    self.warning(&format!(
                        "{} of {} document(s) failed",
                        failed,
                        entries.len()
                    ))
                };
                Ok(format!("{}\n{}", self.table(builder), footer))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn summary_line(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_domain::{CorrelationId, RecordId};
    use chartwell_extractor::RecordSummary;
    use std::collections::BTreeMap;

    fn outcome() -> ProcessOutcome {
        let correlation_id = CorrelationId::new();
        let mut fields = Map::new();
        fields.insert("length_of_stay_days".to_string(), json!(4));
        fields.insert("risk_level".to_string(), json!("medium"));
        let mut records = BTreeMap::new();
        records.insert(
            RecordKind::HospitalSummary,
            RecordSummary {
                id: RecordId::new(),
                owner_id: "P-1".to_string(),
                correlation_id,
                fields,
            },
        );
        ProcessOutcome {
            correlation_id,
            records,
        }
    }

    #[test]
    fn test_outcome_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let outcome = outcome();
        let output = formatter.format_outcome(&outcome).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["correlation_id"], json!(outcome.correlation_id.to_string()));
        assert_eq!(parsed["records"]["hospital_summary"]["length_of_stay_days"], json!(4));
    }

    #[test]
    fn test_outcome_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let outcome = outcome();
        let output = formatter.format_outcome(&outcome).unwrap();
        assert_eq!(output, outcome.correlation_id.to_string());
    }

    #[test]
    fn test_outcome_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_outcome(&outcome()).unwrap();
        assert!(output.contains("hospital_summary"));
        assert!(output.contains("length_of_stay_days=4, risk_level=medium"));
    }

    #[test]
    fn test_empty_records() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_records(&[]).unwrap();
        assert!(output.contains("No records found"));
    }

    #[test]
    fn test_batch_table_reports_failures() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let entries = vec![
            BatchEntry {
                file: PathBuf::from("a.txt"),
                outcome: Ok(outcome()),
            },
            BatchEntry {
                file: PathBuf::from("b.txt"),
                outcome: Err("capability 'labs' failed after 3 attempt(s)".to_string()),
            },
        ];
        let output = formatter.format_batch(&entries).unwrap();
        assert!(output.contains("a.txt"));
        assert!(output.contains("capability 'labs' failed"));
        assert!(output.contains("1 of 2 document(s) failed"));
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let msg = formatter.success("test");
        assert_eq!(msg, "✓ test");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0192f3a4-aaaa"), "0192f3a4");
        assert_eq!(short_id("abc"), "abc");
    }
}
