//! Structural checks on table schemas: required columns, duplicated
//! column names, cross-file agreement, and repeated header rows.
//!
//! Column names are compared case-sensitively and verbatim.

use std::collections::{BTreeSet, HashMap};

use clap::ValueEnum;

use crate::{error::ConsolidateError, sheet::Table};

/// How the required column set is matched against a table's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ColumnPolicy {
    /// Every required column must be present; extra columns are allowed.
    #[default]
    Subset,
    /// The column set must equal the required set exactly.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredColumns {
    pub names: Vec<String>,
    pub policy: ColumnPolicy,
}

impl RequiredColumns {
    pub fn new<I, S>(names: I, policy: ColumnPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            policy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn check(&self, file: &str, columns: &[String]) -> Result<(), ConsolidateError> {
        let present = columns.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let required = self.names.iter().map(String::as_str).collect::<BTreeSet<_>>();

        let missing = self
            .names
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        let unexpected = match self.policy {
            ColumnPolicy::Subset => Vec::new(),
            ColumnPolicy::Exact => columns
                .iter()
                .filter(|name| !required.contains(name.as_str()))
                .cloned()
                .collect(),
        };

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(ConsolidateError::MissingColumns {
                file: file.to_string(),
                missing,
                unexpected,
            })
        }
    }
}

/// Names that occur more than once, in order of their second appearance.
pub fn duplicate_columns(columns: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = Vec::new();
    for name in columns {
        let count = seen.entry(name.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(name.clone());
        }
    }
    duplicates
}

pub fn check_duplicate_columns(file: &str, columns: &[String]) -> Result<(), ConsolidateError> {
    let names = duplicate_columns(columns);
    if names.is_empty() {
        Ok(())
    } else {
        Err(ConsolidateError::DuplicateColumns {
            file: file.to_string(),
            names,
        })
    }
}

/// Fails unless `actual` equals `expected` name for name, in order.
pub fn check_consistent(
    file: &str,
    expected: &[String],
    actual: &[String],
) -> Result<(), ConsolidateError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConsolidateError::SchemaMismatch {
            file: file.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

pub fn is_repeated_header(columns: &[String], row: &[String]) -> bool {
    !columns.is_empty() && columns == row
}

/// Drops the first data row when it repeats the header verbatim.
pub fn strip_repeated_header(table: &mut Table) -> bool {
    let repeated = table
        .rows
        .first()
        .is_some_and(|row| is_repeated_header(&table.columns, row));
    if repeated {
        table.rows.remove(0);
    }
    repeated
}

/// Columns removed from every table before the schemas are compared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilter {
    /// Drop index artifacts such as `Unnamed: 0` and blank header cells.
    pub drop_unnamed: bool,
    /// Drop these exact names when present.
    pub drop: Vec<String>,
}

impl ColumnFilter {
    pub fn is_noop(&self) -> bool {
        !self.drop_unnamed && self.drop.is_empty()
    }

    pub fn apply(&self, table: &mut Table) -> Vec<String> {
        if self.is_noop() {
            return Vec::new();
        }
        table.drop_columns(|name| {
            (self.drop_unnamed && is_unnamed_column(name)) || self.drop.iter().any(|d| d == name)
        })
    }
}

pub fn is_unnamed_column(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.to_ascii_lowercase().starts_with("unnamed")
}
