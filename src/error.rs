//! Error taxonomy shared by every stage of the pipeline.
//!
//! Structural faults (missing files, undetectable encodings, column
//! problems) abort immediately. Row-level faults are accumulated into a
//! [`ValidationReport`] and surface together as
//! [`ConsolidateError::ValidationFailed`] once the full pass is complete.

use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::report::ValidationReport;

#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("The list of input files is empty")]
    EmptyInput,

    #[error("Input file {path:?} does not exist")]
    FileNotFound { path: PathBuf },

    #[error("Could not determine the text encoding of {path:?}")]
    EncodingUndetermined { path: PathBuf },

    #[error("Unknown encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("Encoding '{label}' cannot be used for output")]
    UnsupportedOutputEncoding { label: String },

    #[error("Input files do not share one encoding: {}", describe_pairs(.encodings))]
    EncodingMismatch { encodings: Vec<(String, String)> },

    #[error("{file}: {}", describe_missing(.missing, .unexpected))]
    MissingColumns {
        file: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("{file}: duplicated column name(s) {names:?}")]
    DuplicateColumns { file: String, names: Vec<String> },

    #[error("Columns of {file} do not match\n  expected: {expected:?}\n  found:    {actual:?}")]
    SchemaMismatch {
        file: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Validation failed with {} error(s) across {rows_processed} row(s)", .report.error_count())]
    ValidationFailed {
        report: ValidationReport,
        rows_processed: usize,
    },

    #[error("Failed to decode {path:?} as {encoding}")]
    Decode {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error("Value {value:?} cannot be written to {path:?} as {encoding}")]
    Unencodable {
        path: PathBuf,
        encoding: &'static str,
        value: String,
    },

    #[error("Invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("I/O failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed delimited data in {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read spreadsheet {path:?}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("Spreadsheet {path:?} has no worksheets")]
    NoWorksheet { path: PathBuf },

    #[error("Sheet '{sheet}' already exists in {path:?}")]
    SheetExists { path: PathBuf, sheet: String },

    #[error("Failed to write workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("Failed to render XML document: {0}")]
    Xml(String),
}

impl ConsolidateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ConsolidateError::FileNotFound { path }
        } else {
            ConsolidateError::Io { path, source }
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ConsolidateError::Csv {
            path: path.into(),
            source,
        }
    }

    /// Row-level report carried by a failed validation pass, if any.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ConsolidateError::ValidationFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}

fn describe_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(file, encoding)| format!("{file} → {encoding}"))
        .join(", ")
}

fn describe_missing(missing: &[String], unexpected: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required column(s) {missing:?}"));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected column(s) {unexpected:?}"));
    }
    parts.join("; ")
}
