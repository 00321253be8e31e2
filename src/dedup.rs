//! Brand/model/coefficient validation and duplicate resolution.
//!
//! Every row is checked and every duplicate group inspected before any
//! decision is made, so a failed run reports all problems at once.
//! Rows sharing a trimmed `(brand, model)` key must agree on the
//! coefficient exactly; agreeing duplicates collapse to their first
//! occurrence, disagreeing ones are errors.

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    error::ConsolidateError,
    report::{Category, RowRef, ValidationReport},
    schema::{self, ColumnPolicy, RequiredColumns},
    sheet::{Table, format_float},
};

pub const BRAND: &str = "brand";
pub const MODEL: &str = "model";
pub const COEFFICIENT: &str = "coefficient";

/// Spreadsheet row of the first data row (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

pub fn required_columns() -> RequiredColumns {
    RequiredColumns::new([BRAND, MODEL, COEFFICIENT], ColumnPolicy::Subset)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientRecord {
    pub brand: String,
    pub model: String,
    pub coefficient: f64,
    /// Spreadsheet-style row number of the kept occurrence.
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    /// One record per key, in first-occurrence order.
    pub records: Vec<CoefficientRecord>,
    pub rows_processed: usize,
    pub duplicates_dropped: usize,
    /// Warnings only; a report with errors never reaches an outcome.
    pub report: ValidationReport,
}

/// Parses a coefficient the way a spreadsheet user writes it: surrounding
/// whitespace is ignored and a lone decimal comma (`1,35`) is accepted.
/// Non-finite values are rejected.
pub fn parse_coefficient(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if !trimmed.contains('.') && trimmed.matches(',').count() == 1 {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

struct Group {
    brand: String,
    model: String,
    members: Vec<usize>,
}

pub fn dedup_coefficients(table: &Table) -> Result<DedupOutcome, ConsolidateError> {
    schema::check_duplicate_columns(&table.source, &table.columns)?;
    required_columns().check(&table.source, &table.columns)?;
    let brand_idx = column(table, BRAND)?;
    let model_idx = column(table, MODEL)?;
    let coefficient_idx = column(table, COEFFICIENT)?;

    let mut report = ValidationReport::new();
    let mut candidates: Vec<CoefficientRecord> = Vec::with_capacity(table.len());

    for (idx, row) in table.rows.iter().enumerate() {
        let row_number = idx + FIRST_DATA_ROW;
        let at = || RowRef::row(table.source.as_str(), row_number);
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

        let brand = cell(brand_idx);
        let model = cell(model_idx);
        let raw_coefficient = cell(coefficient_idx);
        let mut valid = true;

        if brand.is_empty() {
            report.error(at(), Category::EmptyField, "brand is empty");
            valid = false;
        }
        if model.is_empty() {
            report.error(at(), Category::EmptyField, "model is empty");
            valid = false;
        }
        let coefficient = if raw_coefficient.is_empty() {
            report.error(at(), Category::EmptyField, "coefficient is empty");
            None
        } else {
            let parsed = parse_coefficient(raw_coefficient);
            if parsed.is_none() {
                report.error(
                    at(),
                    Category::NonNumericCoefficient,
                    format!("coefficient '{raw_coefficient}' is not numeric"),
                );
            }
            parsed
        };

        match coefficient {
            Some(coefficient) if valid => candidates.push(CoefficientRecord {
                brand: brand.to_string(),
                model: model.to_string(),
                coefficient,
                row: row_number,
            }),
            _ => debug!("Row {row_number} of {} excluded from grouping", table.source),
        }
    }

    let groups = group_by_key(&candidates);
    let mut keep = vec![true; candidates.len()];
    let mut duplicates_dropped = 0usize;

    for group in groups.iter().filter(|g| g.members.len() > 1) {
        let mut distinct: Vec<f64> = Vec::new();
        for &member in &group.members {
            let value = candidates[member].coefficient;
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        let rows = group
            .members
            .iter()
            .map(|&m| candidates[m].row.to_string())
            .join(", ");
        let first_row = candidates[group.members[0]].row;
        let location = RowRef::row(table.source.as_str(), first_row);

        if distinct.len() > 1 {
            let values = distinct.iter().map(|v| format_float(*v)).join(", ");
            report.error(
                location,
                Category::ConflictingDuplicate,
                format!(
                    "{} {} has different coefficients [{values}] in rows {rows}",
                    group.brand, group.model
                ),
            );
        } else {
            report.warning(
                location,
                Category::SafeDuplicate,
                format!(
                    "{} {} repeated with coefficient {} in rows {rows}",
                    group.brand,
                    group.model,
                    format_float(distinct[0])
                ),
            );
            for &member in &group.members[1..] {
                keep[member] = false;
            }
            duplicates_dropped += group.members.len() - 1;
        }
    }

    let rows_processed = table.len();
    if report.has_errors() {
        info!(
            "Rows processed: {rows_processed} | errors: {} | duplicates dropped: 0",
            report.error_count()
        );
        return Err(ConsolidateError::ValidationFailed {
            report,
            rows_processed,
        });
    }

    if duplicates_dropped > 0 {
        warn!("Dropped {duplicates_dropped} safe duplicate row(s)");
    }
    let records = candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(record, kept)| kept.then_some(record))
        .collect::<Vec<_>>();
    info!(
        "Rows processed: {rows_processed} | errors: 0 | duplicates dropped: {duplicates_dropped}"
    );
    Ok(DedupOutcome {
        records,
        rows_processed,
        duplicates_dropped,
        report,
    })
}

fn group_by_key(records: &[CoefficientRecord]) -> Vec<Group> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let key = (record.brand.as_str(), record.model.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                brand: record.brand.clone(),
                model: record.model.clone(),
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(idx);
    }
    groups
}

fn column(table: &Table, name: &str) -> Result<usize, ConsolidateError> {
    table
        .column_index(name)
        .ok_or_else(|| ConsolidateError::MissingColumns {
            file: table.source.clone(),
            missing: vec![name.to_string()],
            unexpected: Vec::new(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> Table {
        Table::new(
            "prices.csv",
            vec![BRAND.into(), MODEL.into(), COEFFICIENT.into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn parse_coefficient_accepts_decimal_comma() {
        assert_eq!(parse_coefficient(" 1,35 "), Some(1.35));
        assert_eq!(parse_coefficient("1.35"), Some(1.35));
        assert_eq!(parse_coefficient("2"), Some(2.0));
        assert_eq!(parse_coefficient("1e-1"), Some(0.1));
        assert_eq!(parse_coefficient("1.000,5"), None);
        assert_eq!(parse_coefficient("abc"), None);
        assert_eq!(parse_coefficient("NaN"), None);
        assert_eq!(parse_coefficient(""), None);
    }

    #[test]
    fn safe_duplicates_collapse_to_first_occurrence() {
        let outcome = dedup_coefficients(&table(&[
            ["VOLVO", "XC60", "1.2"],
            ["KIA", "SPORTAGE", "1.5"],
            [" VOLVO ", "XC60", "1.20"],
        ]))
        .expect("valid sheet");
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].brand, "VOLVO");
        assert_eq!(outcome.records[0].row, 2);
        assert_eq!(outcome.records[1].model, "SPORTAGE");
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.rows_processed, 3);
        assert_eq!(outcome.report.warning_count(), 1);
        assert_eq!(
            outcome.report.entries()[0].category,
            Category::SafeDuplicate
        );
    }

    #[test]
    fn conflicting_duplicates_name_every_value() {
        let err = dedup_coefficients(&table(&[
            ["VOLVO", "XC60", "1.2"],
            ["VOLVO", "XC60", "1.3"],
            ["VOLVO", "XC60", "1.2"],
        ]))
        .expect_err("conflict");
        let report = err.report().expect("report");
        let conflicts = report
            .by_category(Category::ConflictingDuplicate)
            .collect::<Vec<_>>();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].message.contains("[1.2, 1.3]"));
        assert!(conflicts[0].message.contains("rows 2, 3, 4"));
        assert_eq!(conflicts[0].location, RowRef::row("prices.csv", 2));
    }

    #[test]
    fn near_equal_coefficients_conflict() {
        let err = dedup_coefficients(&table(&[
            ["VOLVO", "XC60", "1.2"],
            ["VOLVO", "XC60", "1.2000001"],
        ]))
        .expect_err("exact comparison");
        assert_eq!(err.report().map(|r| r.error_count()), Some(1));
    }

    #[test]
    fn every_row_problem_is_collected() {
        let err = dedup_coefficients(&table(&[
            ["", "XC60", "1.2"],
            ["KIA", "", ""],
            ["SEAT", "IBIZA", "cheap"],
            ["SEAT", "LEON", "1.1"],
        ]))
        .expect_err("row errors");
        let report = err.report().expect("report");
        assert_eq!(report.error_count(), 4);
        let rows = report
            .entries()
            .iter()
            .map(|e| e.location.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                RowRef::row("prices.csv", 2),
                RowRef::row("prices.csv", 3),
                RowRef::row("prices.csv", 3),
                RowRef::row("prices.csv", 4),
            ]
        );
        assert_eq!(
            report.by_category(Category::NonNumericCoefficient).count(),
            1
        );
        match err {
            ConsolidateError::ValidationFailed { rows_processed, .. } => {
                assert_eq!(rows_processed, 4)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_required_column_fails_before_rows() {
        let sheet = Table::new(
            "prices.csv",
            vec![BRAND.into(), "coef".into()],
            vec![vec!["VOLVO".into(), "1.2".into()]],
        );
        assert!(matches!(
            dedup_coefficients(&sheet),
            Err(ConsolidateError::MissingColumns { .. })
        ));
    }

    #[test]
    fn repeated_column_name_is_rejected_before_rows() {
        let sheet = Table::new(
            "prices.csv",
            vec![BRAND.into(), MODEL.into(), COEFFICIENT.into(), BRAND.into()],
            vec![vec!["VOLVO".into(), "XC60".into(), "1.2".into(), "KIA".into()]],
        );
        match dedup_coefficients(&sheet) {
            Err(ConsolidateError::DuplicateColumns { file, names }) => {
                assert_eq!(file, "prices.csv");
                assert_eq!(names, vec![BRAND.to_string()]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn keys_are_case_sensitive() {
        let outcome = dedup_coefficients(&table(&[
            ["Volvo", "XC60", "1.2"],
            ["VOLVO", "XC60", "1.3"],
        ]))
        .expect("distinct keys");
        assert_eq!(outcome.records.len(), 2);
    }
}
