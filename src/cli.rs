use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    discover::DEFAULT_PATTERN,
    schema::ColumnPolicy,
    workbook::{ExistingSheet, WriteMode},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate, consolidate, and deduplicate CSV/Excel sheets",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report the detected text encoding of one or more files
    Detect(DetectArgs),
    /// Validate and concatenate files that share one column layout
    Consolidate(ConsolidateArgs),
    /// Build a coefficient rule XML from a brand/model/coefficient sheet
    Xml(XmlArgs),
    /// Write a CSV or spreadsheet into a named sheet of an .xlsx workbook
    Sheet(SheetArgs),
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Files to inspect
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    /// Input files, consolidated in the order given
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Directories searched for inputs matching --pattern (after explicit inputs)
    #[arg(long = "dir", action = clap::ArgAction::Append)]
    pub dirs: Vec<PathBuf>,
    /// File name mask used with --dir
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,
    /// Destination file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter of the input files (supports ',', ';', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter for the output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Encoding of the inputs, or 'auto' to detect each file separately
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Encoding of the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Fail unless every input is detected with the same encoding
    #[arg(long = "same-encoding")]
    pub same_encoding: bool,
    /// Comma-separated columns every input must contain
    #[arg(long = "require", value_delimiter = ',')]
    pub require: Vec<String>,
    /// Whether --require is a minimum set or the exact column set
    #[arg(long = "column-policy", value_enum, default_value = "subset")]
    pub column_policy: ColumnPolicy,
    /// Drop 'Unnamed…' and blank-named columns before comparing layouts
    #[arg(long = "drop-unnamed")]
    pub drop_unnamed: bool,
    /// Drop this column when present (repeatable)
    #[arg(long = "drop-column", action = clap::ArgAction::Append)]
    pub drop_columns: Vec<String>,
    /// Validate and report without writing output
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Write the validation report as JSON
    #[arg(long = "report-json")]
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct XmlArgs {
    /// CSV or spreadsheet with brand, model and coefficient columns
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination XML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Delimiter of a CSV input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Encoding of a CSV input, or 'auto' to detect it
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Emit the document on as few lines as possible
    #[arg(long)]
    pub compact: bool,
    /// Write the validation report as JSON
    #[arg(long = "report-json")]
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SheetArgs {
    /// CSV or spreadsheet to copy into the workbook
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Target .xlsx workbook
    #[arg(short = 'w', long = "workbook")]
    pub workbook: PathBuf,
    /// Sheet name (defaults to the input file stem)
    #[arg(long)]
    pub sheet: Option<String>,
    /// write replaces the workbook, append keeps its sheets, auto picks by existence
    #[arg(long, value_enum, default_value = "auto")]
    pub mode: WriteMode,
    /// What to do when the sheet already exists in an appended workbook
    #[arg(long = "on-existing", value_enum, default_value = "replace")]
    pub on_existing: ExistingSheet,
    /// Delimiter of a CSV input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Encoding of a CSV input, or 'auto' to detect it
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
