//! Validation report accumulated during a pipeline run.
//!
//! Entries are kept in the order they were detected. Any entry with
//! [`Severity::Error`] blocks output; warnings are informational.

use std::{fmt, fs, path::Path};

use itertools::Itertools;
use serde::Serialize;

use crate::{error::ConsolidateError, io_utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MissingColumn,
    EmptyField,
    NonNumericCoefficient,
    ConflictingDuplicate,
    SafeDuplicate,
    EncodingMismatch,
    DuplicateColumn,
    SchemaMismatch,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MissingColumn => "missing_column",
            Category::EmptyField => "empty_field",
            Category::NonNumericCoefficient => "non_numeric_coefficient",
            Category::ConflictingDuplicate => "conflicting_duplicate",
            Category::SafeDuplicate => "safe_duplicate",
            Category::EncodingMismatch => "encoding_mismatch",
            Category::DuplicateColumn => "duplicate_column",
            Category::SchemaMismatch => "schema_mismatch",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entry points: a spreadsheet-style row (header is row 1, so the
/// first data row is row 2) or a whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowRef {
    Row { file: String, row: usize },
    File { file: String },
}

impl RowRef {
    pub fn row(file: impl Into<String>, row: usize) -> Self {
        RowRef::Row {
            file: file.into(),
            row,
        }
    }

    pub fn file(file: impl Into<String>) -> Self {
        RowRef::File { file: file.into() }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Row { file, row } => write!(f, "{file} row {row}"),
            RowRef::File { file } => f.write_str(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub location: RowRef,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.location, self.message, self.category)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    entries: Vec<ReportEntry>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, location: RowRef, category: Category, message: impl Into<String>) {
        self.push(location, category, Severity::Error, message);
    }

    pub fn warning(&mut self, location: RowRef, category: Category, message: impl Into<String>) {
        self.push(location, category, Severity::Warning, message);
    }

    fn push(
        &mut self,
        location: RowRef,
        category: Category,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.entries.push(ReportEntry {
            location,
            category,
            severity,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    /// Single-entry report describing a structural failure, for callers that
    /// display every outcome through the same report surface.
    pub fn from_error(err: &ConsolidateError) -> Option<Self> {
        let (location, category, message) = match err {
            ConsolidateError::ValidationFailed { report, .. } => return Some(report.clone()),
            ConsolidateError::MissingColumns { file, .. } => {
                (RowRef::file(file), Category::MissingColumn, err.to_string())
            }
            ConsolidateError::DuplicateColumns { file, .. } => {
                (RowRef::file(file), Category::DuplicateColumn, err.to_string())
            }
            ConsolidateError::SchemaMismatch { file, .. } => {
                (RowRef::file(file), Category::SchemaMismatch, err.to_string())
            }
            ConsolidateError::EncodingMismatch { encodings } => {
                let label = encodings.iter().map(|(file, _)| file.as_str()).join(", ");
                (RowRef::file(label), Category::EncodingMismatch, err.to_string())
            }
            _ => return None,
        };
        let mut report = ValidationReport::new();
        report.error(location, category, message);
        Some(report)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ConsolidateError> {
        io_utils::ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| ConsolidateError::io(path, std::io::Error::other(err)))?;
        fs::write(path, json).map_err(|err| ConsolidateError::io(path, err))
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a ReportEntry;
    type IntoIter = std::slice::Iter<'a, ReportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
