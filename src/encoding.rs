//! Per-file text encoding detection.
//!
//! Only a bounded prefix of each file is inspected. A byte-order mark is
//! authoritative; otherwise `chardetng` guesses from the byte distribution.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use log::info;

use crate::{cli::DetectArgs, error::ConsolidateError, io_utils};

pub const SAMPLE_BYTES: usize = 10_000;

/// How the encoding of each input file is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingChoice {
    #[default]
    Auto,
    Fixed(&'static Encoding),
}

impl EncodingChoice {
    /// `None` and `"auto"` select detection; anything else is an encoding label.
    pub fn from_label(label: Option<&str>) -> Result<Self, ConsolidateError> {
        match label.map(str::trim) {
            None => Ok(EncodingChoice::Auto),
            Some(value) if value.eq_ignore_ascii_case("auto") => Ok(EncodingChoice::Auto),
            Some(value) => io_utils::resolve_encoding(Some(value)).map(EncodingChoice::Fixed),
        }
    }

    pub fn resolve(&self, path: &Path) -> Result<&'static Encoding, ConsolidateError> {
        match self {
            EncodingChoice::Auto => detect_encoding(path),
            EncodingChoice::Fixed(encoding) => {
                if !path.exists() {
                    return Err(ConsolidateError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                Ok(encoding)
            }
        }
    }
}

pub fn detect_encoding(path: &Path) -> Result<&'static Encoding, ConsolidateError> {
    let (sample, complete) = read_sample(path, SAMPLE_BYTES)?;
    detect_from_sample(&sample, complete).ok_or_else(|| ConsolidateError::EncodingUndetermined {
        path: path.to_path_buf(),
    })
}

/// Guesses the encoding of `sample`. `complete` tells the detector whether
/// the sample is the whole file, so a truncated trailing sequence is not
/// held against UTF-8.
pub fn detect_from_sample(sample: &[u8], complete: bool) -> Option<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return Some(encoding);
    }
    if sample.is_empty() || sample.contains(&0) {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    Some(detector.guess(None, true))
}

fn read_sample(path: &Path, limit: usize) -> Result<(Vec<u8>, bool), ConsolidateError> {
    let file = File::open(path).map_err(|err| ConsolidateError::io(path, err))?;
    let total = file
        .metadata()
        .map_err(|err| ConsolidateError::io(path, err))?
        .len();
    let mut sample = Vec::with_capacity(limit.min(total as usize));
    file.take(limit as u64)
        .read_to_end(&mut sample)
        .map_err(|err| ConsolidateError::io(path, err))?;
    Ok((sample, total <= limit as u64))
}

pub fn execute(args: &DetectArgs) -> Result<()> {
    let mut undetermined: Vec<PathBuf> = Vec::new();
    for path in &args.inputs {
        match detect_encoding(path) {
            Ok(encoding) => {
                println!("{} → {}", io_utils::file_label(path), encoding.name());
            }
            Err(ConsolidateError::EncodingUndetermined { path }) => {
                println!("{} → undetermined", io_utils::file_label(&path));
                undetermined.push(path);
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(
        "Detected encodings for {} of {} file(s)",
        args.inputs.len() - undetermined.len(),
        args.inputs.len()
    );
    match undetermined.first() {
        Some(path) => Err(ConsolidateError::EncodingUndetermined { path: path.clone() }.into()),
        None => Ok(()),
    }
}
