//! Multi-file consolidation.
//!
//! Files are processed strictly in list order. Each one gets its own
//! encoding, is loaded as text, and must reproduce the first file's column
//! sequence exactly; the first structural failure aborts the batch before
//! anything is written. A header row repeated as the first data row is
//! dropped and counted.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    cli::ConsolidateArgs,
    console::{self, Tone},
    discover,
    encoding::EncodingChoice,
    error::ConsolidateError,
    io_utils,
    report::ValidationReport,
    schema::{self, ColumnFilter, RequiredColumns},
    sheet::{self, SourceKind, Table},
};

#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    pub delimiter: u8,
    pub encoding: EncodingChoice,
    /// Refuse to proceed unless every delimited input detects the same encoding.
    pub require_same_encoding: bool,
    pub required: Option<RequiredColumns>,
    pub columns: ColumnFilter,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: EncodingChoice::Auto,
            require_same_encoding: false,
            required: None,
            columns: ColumnFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEncoding {
    pub file: String,
    /// `None` for workbook inputs, which carry no text encoding.
    pub encoding: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationSummary {
    pub files: usize,
    pub original_rows: usize,
    pub headers_removed: usize,
    pub final_rows: usize,
    pub encodings: Vec<FileEncoding>,
}

impl ConsolidationSummary {
    fn log(&self) {
        info!(
            "Files consolidated: {} | original rows: {} | headers removed: {} | final rows: {}",
            self.files, self.original_rows, self.headers_removed, self.final_rows
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidated {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub summary: ConsolidationSummary,
}

impl Consolidated {
    /// Writes the header and all rows, overwriting `path` (stdout for
    /// `None` or `-`). Content the output encoding cannot hold is refused
    /// before the destination is touched.
    pub fn write_delimited(
        &self,
        path: Option<&Path>,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<(), ConsolidateError> {
        let target = path.unwrap_or_else(|| Path::new("-"));
        io_utils::check_encodable(
            target,
            encoding,
            self.columns.iter().chain(self.rows.iter().flatten()),
        )?;
        let mut writer = io_utils::open_csv_writer(path, delimiter, encoding)?;
        writer
            .write_record(&self.columns)
            .map_err(|err| ConsolidateError::csv(target, err))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| ConsolidateError::csv(target, err))?;
        }
        writer
            .flush()
            .map_err(|err| ConsolidateError::io(target, err))
    }

    pub fn into_table(self, source: impl Into<String>) -> Table {
        Table::new(source, self.columns, self.rows)
    }
}

pub fn consolidate(
    paths: &[PathBuf],
    options: &ConsolidateOptions,
) -> Result<Consolidated, ConsolidateError> {
    let mut summary = ConsolidationSummary {
        files: paths.len(),
        ..ConsolidationSummary::default()
    };
    let result = consolidate_into(paths, options, &mut summary);
    summary.log();
    result.map(|(columns, rows)| Consolidated {
        columns,
        rows,
        summary,
    })
}

fn consolidate_into(
    paths: &[PathBuf],
    options: &ConsolidateOptions,
    summary: &mut ConsolidationSummary,
) -> Result<(Vec<String>, Vec<Vec<String>>), ConsolidateError> {
    if paths.is_empty() {
        return Err(ConsolidateError::EmptyInput);
    }

    let encodings = resolve_encodings(paths, options)?;
    summary.encodings = paths
        .iter()
        .zip(encodings.iter().copied())
        .map(|(path, encoding)| FileEncoding {
            file: io_utils::file_label(path),
            encoding: encoding.map(Encoding::name),
        })
        .collect();

    let mut baseline: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (path, encoding) in paths.iter().zip(encodings.iter().copied()) {
        info!("Processing {:?}", path);
        let mut table = match encoding {
            Some(encoding) => sheet::read_delimited(path, options.delimiter, encoding)?,
            None => sheet::read_spreadsheet(path)?,
        };
        summary.original_rows += table.len();

        let dropped = options.columns.apply(&mut table);
        if !dropped.is_empty() {
            debug!("Dropped column(s) {:?} from {}", dropped, table.source);
        }

        schema::check_duplicate_columns(&table.source, &table.columns)?;
        if let Some(required) = options.required.as_ref().filter(|r| !r.is_empty()) {
            required.check(&table.source, &table.columns)?;
        }
        match &baseline {
            Some(expected) => schema::check_consistent(&table.source, expected, &table.columns)?,
            None => baseline = Some(table.columns.clone()),
        }

        if schema::strip_repeated_header(&mut table) {
            summary.headers_removed += 1;
            warn!("Removed repeated header row from {}", table.source);
        }
        rows.append(&mut table.rows);
        summary.final_rows = rows.len();
    }

    Ok((baseline.unwrap_or_default(), rows))
}

/// Encoding per input; `None` marks workbook inputs. Every path is checked
/// for existence here, before any file is parsed.
fn resolve_encodings(
    paths: &[PathBuf],
    options: &ConsolidateOptions,
) -> Result<Vec<Option<&'static Encoding>>, ConsolidateError> {
    let mut encodings = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            return Err(ConsolidateError::FileNotFound { path: path.clone() });
        }
        let encoding = match SourceKind::of(path) {
            SourceKind::Spreadsheet => None,
            SourceKind::Delimited => Some(options.encoding.resolve(path)?),
        };
        info!(
            "{} → {}",
            io_utils::file_label(path),
            encoding.map_or("workbook", Encoding::name)
        );
        encodings.push(encoding);
    }

    if options.require_same_encoding {
        let distinct = encodings
            .iter()
            .flatten()
            .map(|e| e.name())
            .collect::<BTreeSet<_>>();
        if distinct.len() > 1 {
            return Err(ConsolidateError::EncodingMismatch {
                encodings: paths
                    .iter()
                    .zip(&encodings)
                    .filter_map(|(path, encoding)| {
                        encoding.map(|e| (io_utils::file_label(path), e.name().to_string()))
                    })
                    .collect(),
            });
        }
    }
    Ok(encodings)
}

pub fn execute(args: &ConsolidateArgs) -> Result<()> {
    let mut inputs = args.inputs.clone();
    if !args.dirs.is_empty() {
        let found = discover::discover(&args.dirs, &args.pattern)
            .with_context(|| format!("Searching {:?} for '{}'", args.dirs, args.pattern))?;
        inputs.extend(found);
    }

    let delimiter = match inputs.first() {
        Some(first) => io_utils::resolve_input_delimiter(first, args.delimiter),
        None => args.delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER),
    };
    let output_delimiter =
        io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter, delimiter);
    let output_encoding = io_utils::resolve_output_encoding(args.output_encoding.as_deref())?;
    let required = args
        .require
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>();
    let options = ConsolidateOptions {
        delimiter,
        encoding: EncodingChoice::from_label(args.input_encoding.as_deref())?,
        require_same_encoding: args.same_encoding,
        required: (!required.is_empty())
            .then(|| RequiredColumns::new(required, args.column_policy)),
        columns: ColumnFilter {
            drop_unnamed: args.drop_unnamed,
            drop: args.drop_columns.clone(),
        },
    };

    info!(
        "Consolidating {} file(s) -> {:?} (delimiter '{}', output '{}')",
        inputs.len(),
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        crate::printable_delimiter(delimiter),
        crate::printable_delimiter(output_delimiter)
    );
    console::announce(
        Tone::Progress,
        &format!("Consolidating {} file(s)...", inputs.len()),
    );
    let consolidated = match consolidate(&inputs, &options) {
        Ok(consolidated) => consolidated,
        Err(err) => {
            if let Some(report) = ValidationReport::from_error(&err) {
                console::announce_report(&report);
                if let Some(path) = &args.report_json {
                    report
                        .save_json(path)
                        .with_context(|| format!("Writing report to {path:?}"))?;
                }
            }
            console::announce(Tone::Error, "Consolidation aborted; no output written.");
            return Err(err.into());
        }
    };

    let summary = &consolidated.summary;
    console::announce(
        Tone::Progress,
        &format!(
            "Summary: files: {} | original rows: {} | headers removed: {} | final rows: {} | output encoding: {}",
            summary.files,
            summary.original_rows,
            summary.headers_removed,
            summary.final_rows,
            output_encoding.name()
        ),
    );
    if let Some(path) = &args.report_json {
        ValidationReport::new()
            .save_json(path)
            .with_context(|| format!("Writing report to {path:?}"))?;
    }

    if args.dry_run {
        console::announce(Tone::Success, "Validation passed; dry run, nothing written.");
        return Ok(());
    }
    consolidated
        .write_delimited(args.output.as_deref(), output_delimiter, output_encoding)
        .with_context(|| format!("Writing consolidated output to {:?}", args.output))?;
    if let Some(path) = &args.output {
        console::announce(
            Tone::Success,
            &format!("File saved to {}", path.display()),
        );
    }
    Ok(())
}
