//! Input discovery: files in one or more directories matching a mask.

use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::{GlobBuilder, GlobMatcher};
use log::debug;

use crate::error::ConsolidateError;

pub const DEFAULT_PATTERN: &str = "*.csv";

pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher, ConsolidateError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| ConsolidateError::Pattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

/// Regular files directly inside each directory whose names match
/// `pattern`. Directories are visited in the given order; matches within a
/// directory are sorted by name.
pub fn discover(dirs: &[PathBuf], pattern: &str) -> Result<Vec<PathBuf>, ConsolidateError> {
    let matcher = compile_pattern(pattern)?;
    let mut found = Vec::new();
    for dir in dirs {
        let mut matches = matching_files(dir, &matcher)?;
        debug!("{} file(s) in {:?} match '{}'", matches.len(), dir, pattern);
        matches.sort();
        found.append(&mut matches);
    }
    Ok(found)
}

fn matching_files(dir: &Path, matcher: &GlobMatcher) -> Result<Vec<PathBuf>, ConsolidateError> {
    let entries = fs::read_dir(dir).map_err(|err| ConsolidateError::io(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ConsolidateError::io(dir, err))?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            files.push(path);
        }
    }
    Ok(files)
}
