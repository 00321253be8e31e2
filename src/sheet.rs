//! In-memory text tables and the loaders that produce them.
//!
//! Every cell is kept as the text found in the source; nothing is coerced
//! to numbers or dates before validation has run.

use std::{fs, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::debug;

use crate::{error::ConsolidateError, io_utils};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// File name the table was loaded from.
    pub source: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(source: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            columns,
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes every column whose name satisfies `predicate`, returning the
    /// removed names in their original order.
    pub fn drop_columns<F>(&mut self, predicate: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let keep = self
            .columns
            .iter()
            .map(|name| !predicate(name))
            .collect::<Vec<_>>();
        if keep.iter().all(|k| *k) {
            return Vec::new();
        }
        let mut removed = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, kept) in self.columns.drain(..).zip(&keep) {
            if *kept {
                columns.push(name);
            } else {
                removed.push(name);
            }
        }
        self.columns = columns;
        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|_| {
                let kept = keep.get(idx).copied().unwrap_or(true);
                idx += 1;
                kept
            });
        }
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Spreadsheet,
}

impl SourceKind {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext)
                if SPREADSHEET_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known)) =>
            {
                SourceKind::Spreadsheet
            }
            _ => SourceKind::Delimited,
        }
    }
}

/// Reads a delimited file whose first record is the header.
pub fn read_delimited(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table, ConsolidateError> {
    let bytes = fs::read(path).map_err(|err| ConsolidateError::io(path, err))?;
    let text = io_utils::decode_text(path, &bytes, encoding)?;
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let columns = reader
        .headers()
        .map_err(|err| ConsolidateError::csv(path, err))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ConsolidateError::csv(path, err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    debug!(
        "Read {} row(s) x {} column(s) from {:?} as {}",
        rows.len(),
        columns.len(),
        path,
        encoding.name()
    );
    Ok(Table::new(io_utils::file_label(path), columns, rows))
}

/// Reads the first worksheet of a workbook. The first row is the header;
/// short rows are padded with empty cells.
pub fn read_spreadsheet(path: &Path) -> Result<Table, ConsolidateError> {
    if !path.exists() {
        return Err(ConsolidateError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut workbook = open_workbook_auto(path).map_err(|err| spreadsheet_error(path, err))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConsolidateError::NoWorksheet {
            path: path.to_path_buf(),
        })?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|err| spreadsheet_error(path, err))?;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let columns = rows.next().unwrap_or_default();
    let width = columns.len();
    let rows = rows
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect::<Vec<_>>();
    debug!(
        "Read {} row(s) from sheet '{}' of {:?}",
        rows.len(),
        first,
        path
    );
    Ok(Table::new(io_utils::file_label(path), columns, rows))
}

/// Dispatches on the file extension.
pub fn read_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table, ConsolidateError> {
    match SourceKind::of(path) {
        SourceKind::Spreadsheet => read_spreadsheet(path),
        SourceKind::Delimited => read_delimited(path, delimiter, encoding),
    }
}

/// Formats a float as a literal: whole numbers keep one decimal place
/// (`2.0`), everything else uses the shortest form that round-trips.
///
/// Rust's `Display` never switches to exponent notation, so `1e-5` renders
/// as `0.00001` rather than `1e-05`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) => format_float(*value),
        other => other.to_string(),
    }
}

fn spreadsheet_error(path: &Path, err: impl std::fmt::Display) -> ConsolidateError {
    ConsolidateError::Spreadsheet {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
