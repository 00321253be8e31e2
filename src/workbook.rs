//! Writing tables into named worksheets of an `.xlsx` workbook.
//!
//! `rust_xlsxwriter` only creates workbooks, so appending reads the sheets
//! already present with `calamine` and writes them back alongside the new
//! ones. Cell values survive; formatting and formulas do not.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use clap::ValueEnum;
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::{
    cli::SheetArgs,
    console::{self, Tone},
    encoding::EncodingChoice,
    error::ConsolidateError,
    io_utils,
    sheet::{self, SourceKind, Table},
};

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Replace the whole workbook.
    Write,
    /// Keep existing sheets; the workbook must exist.
    Append,
    /// Append when the workbook exists, otherwise write.
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ExistingSheet {
    #[default]
    Replace,
    Error,
}

enum SheetContent<'a> {
    Kept(Vec<Vec<Data>>),
    New(&'a Table),
}

struct PlannedSheet<'a> {
    name: String,
    content: SheetContent<'a>,
}

/// Writes `sheets` (name, table) to `path` and returns the final sheet
/// order. Nothing is touched when a sheet collision is refused.
pub fn write_sheets(
    path: &Path,
    sheets: &[(&str, &Table)],
    mode: WriteMode,
    existing: ExistingSheet,
) -> Result<Vec<String>, ConsolidateError> {
    let effective = match mode {
        WriteMode::Auto if path.exists() => WriteMode::Append,
        WriteMode::Auto => WriteMode::Write,
        other => other,
    };

    let mut plan: Vec<PlannedSheet<'_>> = match effective {
        WriteMode::Append => read_existing(path)?,
        _ => Vec::new(),
    };

    for &(name, table) in sheets {
        match plan.iter_mut().find(|p| p.name == name) {
            Some(_) if existing == ExistingSheet::Error => {
                return Err(ConsolidateError::SheetExists {
                    path: path.to_path_buf(),
                    sheet: name.to_string(),
                });
            }
            Some(slot) => slot.content = SheetContent::New(table),
            None => plan.push(PlannedSheet {
                name: name.to_string(),
                content: SheetContent::New(table),
            }),
        }
    }

    let mut workbook = Workbook::new();
    for planned in &plan {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&planned.name)
            .map_err(|err| workbook_error(path, err))?;
        match &planned.content {
            SheetContent::Kept(rows) => write_cells(worksheet, path, rows)?,
            SheetContent::New(table) => write_table(worksheet, path, table)?,
        }
    }

    io_utils::ensure_parent_dir(path)?;
    workbook.save(path).map_err(|err| workbook_error(path, err))?;
    Ok(plan.into_iter().map(|p| p.name).collect())
}

fn read_existing(path: &Path) -> Result<Vec<PlannedSheet<'static>>, ConsolidateError> {
    if !path.exists() {
        return Err(ConsolidateError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut workbook = open_workbook_auto(path).map_err(|err| read_error(path, err))?;
    let mut planned = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| read_error(path, err))?;
        let rows = range.rows().map(|row| row.to_vec()).collect();
        planned.push(PlannedSheet {
            name,
            content: SheetContent::Kept(rows),
        });
    }
    Ok(planned)
}

fn write_table(
    worksheet: &mut Worksheet,
    path: &Path,
    table: &Table,
) -> Result<(), ConsolidateError> {
    let lines = std::iter::once(&table.columns).chain(table.rows.iter());
    for (row_idx, line) in lines.enumerate() {
        for (col_idx, value) in line.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let (row, col) = position(path, row_idx, col_idx)?;
            worksheet
                .write_string(row, col, value)
                .map_err(|err| workbook_error(path, err))?;
        }
    }
    Ok(())
}

fn write_cells(
    worksheet: &mut Worksheet,
    path: &Path,
    rows: &[Vec<Data>],
) -> Result<(), ConsolidateError> {
    for (row_idx, cells) in rows.iter().enumerate() {
        for (col_idx, cell) in cells.iter().enumerate() {
            let (row, col) = position(path, row_idx, col_idx)?;
            let written = match cell {
                Data::Empty => continue,
                Data::Float(value) => worksheet.write_number(row, col, *value),
                Data::Int(value) => worksheet.write_number(row, col, *value as f64),
                Data::Bool(value) => worksheet.write_boolean(row, col, *value),
                Data::String(text) => worksheet.write_string(row, col, text),
                other => worksheet.write_string(row, col, sheet::cell_text(other)),
            };
            written.map_err(|err| workbook_error(path, err))?;
        }
    }
    Ok(())
}

fn position(path: &Path, row: usize, col: usize) -> Result<(u32, u16), ConsolidateError> {
    if row >= MAX_ROWS || col >= MAX_COLUMNS {
        return Err(ConsolidateError::Workbook {
            path: path.to_path_buf(),
            message: format!("cell ({row}, {col}) is outside worksheet limits"),
        });
    }
    Ok((row as u32, col as u16))
}

fn workbook_error(path: &Path, err: rust_xlsxwriter::XlsxError) -> ConsolidateError {
    ConsolidateError::Workbook {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> ConsolidateError {
    ConsolidateError::Spreadsheet {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

pub fn execute(args: &SheetArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = match SourceKind::of(&args.input) {
        SourceKind::Spreadsheet => encoding_rs::UTF_8,
        SourceKind::Delimited => EncodingChoice::from_label(args.input_encoding.as_deref())?
            .resolve(&args.input)
            .with_context(|| format!("Resolving encoding of {:?}", args.input))?,
    };
    let table = sheet::read_table(&args.input, delimiter, encoding)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let name = match &args.sheet {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sheet1".to_string()),
    };

    let order = write_sheets(
        &args.workbook,
        &[(name.as_str(), &table)],
        args.mode,
        args.on_existing,
    )
    .with_context(|| format!("Writing sheet '{name}' to {:?}", args.workbook))?;
    info!(
        "Workbook {:?} now holds sheet(s) {:?}",
        args.workbook, order
    );
    console::announce(
        Tone::Success,
        &format!("File saved successfully at {}", args.workbook.display()),
    );
    Ok(())
}
