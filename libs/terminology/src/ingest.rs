//! CSV ingestion pipeline: header → rows → normalization → snapshot

use crate::builder::{build, CodeSystemSnapshot};
use crate::error::IngestError;
use crate::normalize::{normalize_rows, Header, RowError, RowReason, RowWarning};
use medisync_models::{
    CodeSystem, IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue,
};
use std::io::Read;

/// What to ingest the table as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub name: String,
    pub canonical_url: String,
    pub delimiter: u8,
}

impl IngestRequest {
    pub fn new(name: impl Into<String>, canonical_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            canonical_url: canonical_url.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Parse a delimiter option: `tab`/`tsv`, `comma`/`csv`, or a single ASCII character
pub fn parse_delimiter(value: &str) -> Option<u8> {
    if value == "\t" {
        return Some(b'\t');
    }
    match value.trim().to_lowercase().as_str() {
        "tab" | "tsv" | "\\t" => Some(b'\t'),
        "comma" | "csv" | "" => Some(b','),
        "semicolon" => Some(b';'),
        "pipe" => Some(b'|'),
        other if other.len() == 1 && other.is_ascii() => other.bytes().next(),
        _ => None,
    }
}

/// A built snapshot plus the accounting of everything skipped
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub code_system: CodeSystemSnapshot,
    pub errors: Vec<RowError>,
    pub warnings: Vec<RowWarning>,
    pub ignored_columns: Vec<String>,
    /// Row errors (`error`), duplicate warnings (`warning`) and ignored
    /// columns (`information`)
    pub outcome: OperationOutcome,
}

impl IngestionReport {
    /// FHIR CodeSystem with the outcome embedded under `outcome`
    pub fn to_fhir(&self) -> CodeSystem {
        let mut cs = self.code_system.to_fhir();
        cs.extensions
            .insert("outcome".to_string(), self.outcome.to_value());
        cs
    }
}

/// Run the whole pipeline over delimited text.
///
/// `prior_versions` is the number of snapshots already stored for the URL.
/// Row-level problems end up in the report; only an unusable header, an I/O
/// failure or a build failure abort.
pub fn ingest<R: Read>(
    reader: R,
    request: &IngestRequest,
    prior_versions: u32,
) -> Result<IngestionReport, IngestError> {
    let canonical_url = request.canonical_url.trim();

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(request.delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let header = {
        let raw = csv_reader.byte_headers()?;
        Header::parse(raw.iter().map(|cell| String::from_utf8_lossy(cell).into_owned()))?
    };
    let ignored_columns: Vec<String> = header.ignored().into_iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for (i, record) in csv_reader.byte_records().enumerate() {
        let row_index = i + 1;
        match record {
            Ok(record) => {
                let cells: Result<Vec<&str>, _> =
                    record.iter().map(std::str::from_utf8).collect();
                rows.push(match cells {
                    Ok(cells) => Ok(header.row(row_index, cells)),
                    Err(e) => Err(RowError::unreadable(row_index, format!("invalid UTF-8: {}", e))),
                });
            }
            Err(e) if e.is_io_error() => return Err(IngestError::Csv(e)),
            Err(e) => rows.push(Err(RowError::unreadable(row_index, e.to_string()))),
        }
    }

    let batch = normalize_rows(rows, canonical_url);
    let code_system = build(&request.name, canonical_url, batch.entries, prior_versions)?;
    let outcome = build_outcome(&ignored_columns, &batch.errors, &batch.warnings);

    tracing::info!(
        url = %code_system.url,
        version = code_system.version,
        count = code_system.count(),
        rejected = batch.errors.len(),
        duplicates = batch.warnings.len(),
        "code system ingested"
    );

    Ok(IngestionReport {
        code_system,
        errors: batch.errors,
        warnings: batch.warnings,
        ignored_columns,
        outcome,
    })
}

fn row_issue_type(reason: RowReason) -> IssueType {
    match reason {
        RowReason::MissingCode | RowReason::MissingDisplay => IssueType::Required,
        RowReason::SystemMismatch => IssueType::Value,
        RowReason::UnreadableRow => IssueType::Structure,
    }
}

fn build_outcome(
    ignored: &[String],
    errors: &[RowError],
    warnings: &[RowWarning],
) -> OperationOutcome {
    let mut outcome = OperationOutcome::new();
    for column in ignored {
        outcome.push(
            OperationOutcomeIssue::new(IssueSeverity::Information, IssueType::Informational)
                .with_diagnostics("ignored_column")
                .with_details(format!("column '{}' is not recognised and was ignored", column))
                .with_expression("header"),
        );
    }

    let mut by_row: Vec<(usize, OperationOutcomeIssue)> = errors
        .iter()
        .map(|e| {
            (
                e.row_index,
                OperationOutcomeIssue::new(IssueSeverity::Error, row_issue_type(e.reason))
                    .with_diagnostics(e.reason.as_str())
                    .with_details(e.detail.clone())
                    .with_expression(format!("row[{}]", e.row_index)),
            )
        })
        .chain(warnings.iter().map(|w| {
            (
                w.row_index,
                OperationOutcomeIssue::new(IssueSeverity::Warning, IssueType::Duplicate)
                    .with_diagnostics(RowWarning::REASON)
                    .with_details(format!(
                        "code '{}' replaces the entry from row {}",
                        w.code, w.replaced_row
                    ))
                    .with_expression(format!("row[{}]", w.row_index)),
            )
        }))
        .collect();
    by_row.sort_by_key(|(row, _)| *row);

    for (_, issue) in by_row {
        outcome.push(issue);
    }
    outcome
}
