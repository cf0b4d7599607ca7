//! Code Entry Normalizer
//!
//! Turns one tabular row into a canonical [`CodeEntry`]. Rows arrive as
//! [`RawRow`] values whose cells are tagged by a recognized [`Column`];
//! unrecognized headers become [`Column::Ignored`] and never reach an entry.
//!
//! Normalization is pure: the same row always yields the same entry, and a
//! bad row produces a [`RowError`] value instead of aborting the batch.

use crate::error::IngestError;
use crate::text::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A recognized tabular column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Code,
    Display,
    System,
    Synonyms,
    Definition,
    /// Any other header; its cells are dropped
    Ignored(String),
}

impl Column {
    /// Match a header cell, case-insensitively after trimming
    pub fn from_header(name: &str) -> Self {
        let trimmed = name.trim().trim_start_matches('\u{feff}');
        match trimmed.to_lowercase().as_str() {
            "code" => Column::Code,
            "display" | "term" | "name" => Column::Display,
            "system" => Column::System,
            "synonyms" | "synonym" => Column::Synonyms,
            "definition" => Column::Definition,
            _ => Column::Ignored(trimmed.to_string()),
        }
    }
}

/// Parsed header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<Column>,
}

impl Header {
    /// Tag every header cell. A header without `code` or `display` can never
    /// produce an entry and is rejected outright.
    pub fn parse<I, S>(names: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<Column> = names
            .into_iter()
            .map(|n| Column::from_header(n.as_ref()))
            .collect();

        if !columns.contains(&Column::Code) {
            return Err(IngestError::MissingColumn("code"));
        }
        if !columns.contains(&Column::Display) {
            return Err(IngestError::MissingColumn("display"));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names of the ignored columns, in header order
    pub fn ignored(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| match c {
                Column::Ignored(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Pair a data row's cells with the header. Missing trailing cells are
    /// simply absent; surplus cells beyond the header are dropped.
    pub fn row<I, S>(&self, row_index: usize, cells: I) -> RawRow
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cells = self
            .columns
            .iter()
            .zip(cells)
            .filter(|(column, _)| !matches!(column, Column::Ignored(_)))
            .map(|(column, value)| (column.clone(), value.as_ref().to_string()))
            .collect();
        RawRow { row_index, cells }
    }
}

/// One data row with its cells tagged by column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    /// 1-based data row number (the header is row 0)
    pub row_index: usize,
    pub cells: Vec<(Column, String)>,
}

impl RawRow {
    /// Build a row from a column-name → value mapping
    pub fn from_pairs<I, K, V>(row_index: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let cells = pairs
            .into_iter()
            .map(|(k, v)| (Column::from_header(k.as_ref()), v.into()))
            .filter(|(c, _)| !matches!(c, Column::Ignored(_)))
            .collect();
        Self { row_index, cells }
    }

    /// First non-empty trimmed value for a column
    pub fn value(&self, column: &Column) -> Option<&str> {
        self.cells
            .iter()
            .filter(|(c, _)| c == column)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }
}

/// Canonical terminology unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntry {
    /// Code as supplied, trimmed
    pub code: String,
    /// Lowercase code; the uniqueness and lookup key
    pub code_key: String,
    pub display: String,
    /// Canonical URL of the owning code system
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Distinct folded tokens of code, display and synonyms
    #[serde(default)]
    pub search_text: Vec<String>,
}

impl CodeEntry {
    pub fn new(
        code: impl Into<String>,
        display: impl Into<String>,
        system: impl Into<String>,
        definition: Option<String>,
        synonyms: Vec<String>,
    ) -> Self {
        let code = code.into();
        let display = display.into();

        let mut search_text: Vec<String> = Vec::new();
        let sources = std::iter::once(code.as_str())
            .chain(std::iter::once(display.as_str()))
            .chain(synonyms.iter().map(String::as_str));
        for token in sources.flat_map(tokenize) {
            if !search_text.contains(&token) {
                search_text.push(token);
            }
        }

        Self {
            code_key: code.to_lowercase(),
            code,
            display,
            system: system.into(),
            definition,
            synonyms,
            search_text,
        }
    }
}

/// Why a row was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowReason {
    MissingCode,
    MissingDisplay,
    SystemMismatch,
    UnreadableRow,
}

impl RowReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowReason::MissingCode => "missing_code",
            RowReason::MissingDisplay => "missing_display",
            RowReason::SystemMismatch => "system_mismatch",
            RowReason::UnreadableRow => "unreadable_row",
        }
    }
}

/// A rejected row; ingestion continues past it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_index: usize,
    pub reason: RowReason,
    pub detail: String,
}

impl RowError {
    pub fn new(row_index: usize, reason: RowReason, detail: impl Into<String>) -> Self {
        Self {
            row_index,
            reason,
            detail: detail.into(),
        }
    }

    pub fn unreadable(row_index: usize, detail: impl Into<String>) -> Self {
        Self::new(row_index, RowReason::UnreadableRow, detail)
    }
}

/// A duplicate code replaced an earlier row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    pub row_index: usize,
    pub replaced_row: usize,
    pub code: String,
}

impl RowWarning {
    pub const REASON: &'static str = "duplicate_code";
}

/// Normalize one row against the canonical URL of the code system being built.
pub fn normalize(row: &RawRow, canonical_url: &str) -> Result<CodeEntry, RowError> {
    let code = row
        .value(&Column::Code)
        .ok_or_else(|| RowError::new(row.row_index, RowReason::MissingCode, "code cell is empty"))?;

    let display = row.value(&Column::Display).ok_or_else(|| {
        RowError::new(
            row.row_index,
            RowReason::MissingDisplay,
            format!("display cell is empty for code '{}'", code),
        )
    })?;

    if let Some(system) = row.value(&Column::System) {
        if system != canonical_url {
            return Err(RowError::new(
                row.row_index,
                RowReason::SystemMismatch,
                format!("row system '{}' differs from '{}'", system, canonical_url),
            ));
        }
    }

    let synonyms = row
        .value(&Column::Synonyms)
        .map(|s| {
            s.split([';', '|'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let definition = row.value(&Column::Definition).map(str::to_string);

    Ok(CodeEntry::new(
        code,
        display,
        canonical_url,
        definition,
        synonyms,
    ))
}

/// Result of normalizing a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Surviving entries in first-seen order
    pub entries: Vec<CodeEntry>,
    /// Source row of each entry, parallel to `entries`
    pub entry_rows: Vec<usize>,
    pub errors: Vec<RowError>,
    pub warnings: Vec<RowWarning>,
}

/// Normalize every row, collecting errors and resolving duplicate codes.
///
/// A later row with an already-seen `code_key` takes over the earlier entry's
/// position (last write wins) and leaves a [`RowWarning`] behind.
pub fn normalize_rows<I>(rows: I, canonical_url: &str) -> NormalizedBatch
where
    I: IntoIterator<Item = Result<RawRow, RowError>>,
{
    let mut batch = NormalizedBatch::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let normalized = row.and_then(|r| normalize(&r, canonical_url).map(|e| (r.row_index, e)));
        let entry = match normalized {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(
                    row = error.row_index,
                    reason = error.reason.as_str(),
                    "row rejected"
                );
                batch.errors.push(error);
                continue;
            }
        };
        let (row_index, entry) = entry;

        match positions.get(&entry.code_key) {
            Some(&pos) => {
                batch.warnings.push(RowWarning {
                    row_index,
                    replaced_row: batch.entry_rows[pos],
                    code: entry.code.clone(),
                });
                batch.entries[pos] = entry;
                batch.entry_rows[pos] = row_index;
            }
            None => {
                positions.insert(entry.code_key.clone(), batch.entries.len());
                batch.entries.push(entry);
                batch.entry_rows.push(row_index);
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://terminology.india.gov.in/namaste";

    fn row(index: usize, pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(index, pairs.iter().map(|(k, v)| (*k, v.to_string())))
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let raw = row(
            1,
            &[
                ("code", " NAM001 "),
                ("display", "Vātaja Jvara"),
                ("synonyms", "vata fever; jvara |"),
            ],
        );
        let a = normalize(&raw, URL).unwrap();
        let b = normalize(&raw, URL).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.code, "NAM001");
        assert_eq!(a.code_key, "nam001");
        assert_eq!(a.display, "Vātaja Jvara");
        assert_eq!(a.synonyms, vec!["vata fever", "jvara"]);
        assert_eq!(a.search_text, vec!["nam001", "vataja", "jvara", "vata", "fever"]);
    }

    #[test]
    fn empty_code_and_display_are_rejected() {
        let err = normalize(&row(4, &[("code", "  "), ("display", "x")]), URL).unwrap_err();
        assert_eq!(err.reason, RowReason::MissingCode);
        assert_eq!(err.row_index, 4);

        let err = normalize(&row(5, &[("code", "A")]), URL).unwrap_err();
        assert_eq!(err.reason, RowReason::MissingDisplay);
    }

    #[test]
    fn foreign_system_is_rejected() {
        let err = normalize(
            &row(2, &[("code", "A"), ("display", "x"), ("system", "http://other.org")]),
            URL,
        )
        .unwrap_err();
        assert_eq!(err.reason, RowReason::SystemMismatch);

        let ok = normalize(&row(3, &[("code", "A"), ("display", "x"), ("system", URL)]), URL);
        assert!(ok.is_ok());
    }

    #[test]
    fn header_requires_code_and_display() {
        assert!(matches!(
            Header::parse(["display", "notes"]),
            Err(IngestError::MissingColumn("code"))
        ));
        assert!(matches!(
            Header::parse(["Code", "system"]),
            Err(IngestError::MissingColumn("display"))
        ));

        let header = Header::parse([" CODE ", "Term", "notes", "Synonyms"]).unwrap();
        assert_eq!(header.columns()[1], Column::Display);
        assert_eq!(header.ignored(), vec!["notes"]);
    }

    #[test]
    fn header_row_handles_ragged_cells() {
        let header = Header::parse(["code", "display", "notes", "definition"]).unwrap();
        let raw = header.row(1, ["A1", "Alpha"]);
        assert_eq!(raw.value(&Column::Code), Some("A1"));
        assert_eq!(raw.value(&Column::Definition), None);

        let raw = header.row(2, ["A2", "Beta", "ignored", "def", "surplus"]);
        assert_eq!(raw.cells.len(), 3);
        assert_eq!(raw.value(&Column::Definition), Some("def"));
    }

    #[test]
    fn duplicates_replace_in_place_with_warning() {
        let rows = vec![
            Ok(row(1, &[("code", "A"), ("display", "First")])),
            Ok(row(2, &[("code", "B"), ("display", "Second")])),
            Ok(row(3, &[("code", "a"), ("display", "Replacement")])),
            Err(RowError::unreadable(4, "invalid utf-8")),
        ];

        let batch = normalize_rows(rows, URL);
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[0].display, "Replacement");
        assert_eq!(batch.entries[0].code, "a");
        assert_eq!(batch.entry_rows, vec![3, 2]);
        assert_eq!(
            batch.warnings,
            vec![RowWarning {
                row_index: 3,
                replaced_row: 1,
                code: "a".to_string()
            }]
        );
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].reason, RowReason::UnreadableRow);
    }
}
