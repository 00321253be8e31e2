pub mod cli;
pub mod consolidate;
pub mod console;
pub mod dedup;
pub mod discover;
pub mod encoding;
pub mod error;
pub mod io_utils;
pub mod report;
pub mod schema;
pub mod sheet;
pub mod workbook;
pub mod xml;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::error::ConsolidateError;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_consolidate", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("{:?}", cli.command);
    match cli.command {
        Commands::Detect(args) => encoding::execute(&args),
        Commands::Consolidate(args) => consolidate::execute(&args),
        Commands::Xml(args) => xml::execute(&args),
        Commands::Sheet(args) => workbook::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
