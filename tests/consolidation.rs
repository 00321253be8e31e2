mod common;

use std::fs;

use common::{TestWorkspace, string_row, utf16le_with_bom};
use encoding_rs::{UTF_8, UTF_16LE, WINDOWS_1252};
use sheet_consolidate::{
    ConsolidateError,
    consolidate::{ConsolidateOptions, consolidate},
    encoding::EncodingChoice,
    schema::{ColumnFilter, ColumnPolicy, RequiredColumns},
};

const HEADER: &str = "brand,model,coefficient\n";

#[test]
fn rows_are_concatenated_in_file_then_row_order() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}VOLVO,XC60,1.2\n"));
    let b = ws.write(
        "b.csv",
        &format!("{HEADER}VOLVO,XC60,1.2\nKIA,SPORTAGE,1.5\n"),
    );

    let result = consolidate(&[a, b], &ConsolidateOptions::default()).expect("consolidate");
    assert_eq!(result.columns, string_row(&["brand", "model", "coefficient"]));
    assert_eq!(
        result.rows,
        vec![
            string_row(&["VOLVO", "XC60", "1.2"]),
            string_row(&["VOLVO", "XC60", "1.2"]),
            string_row(&["KIA", "SPORTAGE", "1.5"]),
        ]
    );
    assert_eq!(result.summary.files, 2);
    assert_eq!(result.summary.original_rows, 3);
    assert_eq!(result.summary.headers_removed, 0);
    assert_eq!(result.summary.final_rows, 3);
}

#[test]
fn column_order_mismatch_aborts_with_both_layouts() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}VOLVO,XC60,1.2\n"));
    let b = ws.write("b.csv", "model,brand,coefficient\nXC60,VOLVO,1.2\n");

    let err = consolidate(&[a, b], &ConsolidateOptions::default()).expect_err("mismatch");
    match err {
        ConsolidateError::SchemaMismatch {
            file,
            expected,
            actual,
        } => {
            assert_eq!(file, "b.csv");
            assert_eq!(expected, string_row(&["brand", "model", "coefficient"]));
            assert_eq!(actual, string_row(&["model", "brand", "coefficient"]));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn repeated_header_row_is_dropped_and_counted() {
    let ws = TestWorkspace::new();
    let dirty = ws.write(
        "dirty.csv",
        &format!("{HEADER}brand,model,coefficient\nVOLVO,XC60,1.2\n"),
    );
    let clean = ws.write("clean.csv", &format!("{HEADER}VOLVO,XC60,1.2\n"));

    let options = ConsolidateOptions::default();
    let from_dirty = consolidate(&[dirty], &options).expect("dirty");
    let from_clean = consolidate(&[clean], &options).expect("clean");
    assert_eq!(from_dirty.rows, from_clean.rows);
    assert_eq!(from_dirty.summary.headers_removed, 1);
    assert_eq!(from_dirty.summary.original_rows, 2);
    assert_eq!(from_dirty.summary.final_rows, 1);
    assert_eq!(from_clean.summary.headers_removed, 0);
}

#[test]
fn files_in_different_encodings_consolidate_into_one_output_encoding() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}CITROËN,C4,1.2\n"));
    let b = ws.write_bytes(
        "b.csv",
        &utf16le_with_bom(&format!("{HEADER}ŠKODA,OCTAVIA,1.1\n")),
    );

    let result = consolidate(&[a, b], &ConsolidateOptions::default()).expect("consolidate");
    assert_eq!(result.summary.encodings[1].encoding, Some(UTF_16LE.name()));
    assert_eq!(result.rows[0][0], "CITROËN");
    assert_eq!(result.rows[1][0], "ŠKODA");

    let out = ws.path().join("out").join("merged.csv");
    result
        .write_delimited(Some(out.as_path()), b';', UTF_8)
        .expect("write output");
    let written = fs::read_to_string(&out).expect("utf-8 output");
    assert_eq!(
        written,
        "brand;model;coefficient\nCITROËN;C4;1.2\nŠKODA;OCTAVIA;1.1\n"
    );
}

#[test]
fn output_can_be_transcoded_to_a_legacy_encoding() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}CITROËN,C4,1.2\n"));
    let result = consolidate(&[a], &ConsolidateOptions::default()).expect("consolidate");

    let out = ws.path().join("latin.csv");
    result
        .write_delimited(Some(out.as_path()), b',', WINDOWS_1252)
        .expect("write output");
    let bytes = fs::read(&out).expect("read output");
    assert!(bytes.windows(7).any(|w| w == b"CITRO\xCBN"));
}

#[test]
fn unencodable_output_keeps_the_previous_destination() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}漢字,C4,1.2\n"));
    let options = ConsolidateOptions {
        encoding: EncodingChoice::Fixed(UTF_8),
        ..ConsolidateOptions::default()
    };
    let result = consolidate(&[a], &options).expect("consolidate");

    let out = ws.write("latin.csv", "previous good content\n");
    match result.write_delimited(Some(out.as_path()), b',', WINDOWS_1252) {
        Err(ConsolidateError::Unencodable { value, .. }) => assert_eq!(value, "漢字"),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(&out).expect("read destination"),
        "previous good content\n"
    );

    let fresh = ws.path().join("fresh").join("latin.csv");
    assert!(
        result
            .write_delimited(Some(fresh.as_path()), b',', WINDOWS_1252)
            .is_err()
    );
    assert!(!fresh.exists());
}

#[test]
fn same_encoding_policy_rejects_mixed_inputs() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}CITROËN,C4,1.2\n"));
    let b = ws.write_bytes("b.csv", &utf16le_with_bom(&format!("{HEADER}KIA,RIO,1.1\n")));

    let options = ConsolidateOptions {
        require_same_encoding: true,
        ..ConsolidateOptions::default()
    };
    match consolidate(&[a, b], &options).expect_err("mismatch") {
        ConsolidateError::EncodingMismatch { encodings } => {
            assert_eq!(encodings.len(), 2);
            assert_eq!(encodings[1], ("b.csv".to_string(), "UTF-16LE".to_string()));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn duplicate_column_names_are_rejected() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", "brand,model,brand\nVOLVO,XC60,VOLVO\n");
    match consolidate(&[a], &ConsolidateOptions::default()).expect_err("duplicate") {
        ConsolidateError::DuplicateColumns { file, names } => {
            assert_eq!(file, "a.csv");
            assert_eq!(names, string_row(&["brand"]));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_file_aborts_before_reading_anything() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", &format!("{HEADER}VOLVO,XC60,1.2\n"));
    let missing = ws.path().join("missing.csv");
    assert!(matches!(
        consolidate(&[a, missing], &ConsolidateOptions::default()),
        Err(ConsolidateError::FileNotFound { .. })
    ));
}

#[test]
fn empty_input_list_is_an_error() {
    assert!(matches!(
        consolidate(&[], &ConsolidateOptions::default()),
        Err(ConsolidateError::EmptyInput)
    ));
}

#[test]
fn required_columns_follow_the_selected_policy() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", "brand,model,coefficient,notes\nVOLVO,XC60,1.2,x\n");

    let subset = ConsolidateOptions {
        required: Some(RequiredColumns::new(
            ["brand", "model", "coefficient"],
            ColumnPolicy::Subset,
        )),
        ..ConsolidateOptions::default()
    };
    assert!(consolidate(&[a.clone()], &subset).is_ok());

    let exact = ConsolidateOptions {
        required: Some(RequiredColumns::new(
            ["brand", "model", "coefficient"],
            ColumnPolicy::Exact,
        )),
        ..ConsolidateOptions::default()
    };
    match consolidate(&[a], &exact).expect_err("extra column") {
        ConsolidateError::MissingColumns { unexpected, .. } => {
            assert_eq!(unexpected, string_row(&["notes"]));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unnamed_and_listed_columns_are_dropped_before_comparison() {
    let ws = TestWorkspace::new();
    let a = ws.write("a.csv", ",brand,model,OBS\n0,VOLVO,XC60,first\n");
    let b = ws.write("b.csv", "Unnamed: 0,brand,model\n0,KIA,RIO\n");

    let options = ConsolidateOptions {
        columns: ColumnFilter {
            drop_unnamed: true,
            drop: vec!["OBS".into()],
        },
        ..ConsolidateOptions::default()
    };
    let result = consolidate(&[a, b], &options).expect("consolidate");
    assert_eq!(result.columns, string_row(&["brand", "model"]));
    assert_eq!(
        result.rows,
        vec![string_row(&["VOLVO", "XC60"]), string_row(&["KIA", "RIO"])]
    );
}

#[test]
fn fixed_encoding_is_applied_to_every_file() {
    let ws = TestWorkspace::new();
    let (latin, _, _) = WINDOWS_1252.encode("marca;modelo\nCitroën;Berlingo\n");
    let a = ws.write_bytes("a.csv", &latin);

    let options = ConsolidateOptions {
        delimiter: b';',
        encoding: EncodingChoice::Fixed(WINDOWS_1252),
        ..ConsolidateOptions::default()
    };
    let result = consolidate(&[a], &options).expect("consolidate");
    assert_eq!(result.rows, vec![string_row(&["Citroën", "Berlingo"])]);
    assert_eq!(result.summary.encodings[0].encoding, Some("windows-1252"));
}
