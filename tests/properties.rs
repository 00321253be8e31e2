use proptest::prelude::*;
use sheet_consolidate::{
    dedup::CoefficientRecord,
    schema::strip_repeated_header,
    sheet::Table,
    xml::{FALLBACK_COEFFICIENT, RuleDocument, XmlStyle},
};

fn records() -> impl Strategy<Value = Vec<CoefficientRecord>> {
    prop::collection::vec(
        ("[A-Z]{1,8}", "[A-Z0-9]{1,6}", 0.0f64..10.0),
        0..20,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(idx, (brand, model, coefficient))| CoefficientRecord {
                brand,
                model,
                coefficient,
                row: idx + 2,
            })
            .collect()
    })
}

fn data_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z0-9]{0,5}", 3), 0..10)
}

proptest! {
    #[test]
    fn fallback_is_always_the_single_last_unconditional_node(records in records()) {
        let document = RuleDocument::from_records(&records);
        prop_assert_eq!(document.rules().len(), records.len() + 1);
        prop_assert_eq!(document.fallback().value.as_str(), FALLBACK_COEFFICIENT);
        prop_assert!(document.fallback().is_unconditional());
        prop_assert!(document.keyed_rules().iter().all(|r| r.conditions.len() == 2));

        let xml = document.render(XmlStyle::Compact).expect("render");
        prop_assert_eq!(xml.matches("<coefficient ").count(), records.len() + 1);
        prop_assert!(xml.ends_with("<coefficient value=\"1.0\"/></coefficients></service>\n"));
    }

    #[test]
    fn stripping_a_duplicated_header_matches_the_clean_table(rows in data_rows()) {
        let columns = vec!["brand".to_string(), "model".to_string(), "coefficient".to_string()];
        let mut clean = Table::new("clean.csv", columns.clone(), rows.clone());
        let mut dirty_rows = vec![columns.clone()];
        dirty_rows.extend(rows);
        let mut dirty = Table::new("clean.csv", columns, dirty_rows);

        prop_assert!(strip_repeated_header(&mut dirty));
        prop_assert!(!strip_repeated_header(&mut clean));
        prop_assert_eq!(dirty, clean);
    }
}
