//! Unit tests for registry page extraction

use aircraft_enricher::extractor::{DocumentExtractor, DocumentLayout, ExtractError};
use aircraft_enricher::fetcher::RawDocument;
use aircraft_enricher::{FieldSchema, FieldValue};

use crate::support::{deregistered_page, devkit_table, not_found_page, registered_page};

fn present(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Present(value.to_string()))
}

#[test]
fn test_registered_page_fills_every_field() {
    let extractor = DocumentExtractor::new(FieldSchema::faa_registry());
    let extraction = extractor
        .extract(&RawDocument::new(registered_page("Valid", "172S")))
        .unwrap();

    assert_eq!(extraction.layout, DocumentLayout::ThreeGroup);
    assert_eq!(extraction.fields.len(), 11);
    assert_eq!(extraction.fields.not_available_count(), 0);
    assert_eq!(extraction.fields.get("STATUS").cloned(), present("Valid"));
    assert_eq!(extraction.fields.get("MANUFACTURER NAME").cloned(), present("CESSNA"));
    assert_eq!(extraction.fields.get("TYPE REGISTRATION").cloned(), present("Corporation"));
    assert_eq!(extraction.fields.get("ENGINE MODEL").cloned(), present("IO-360-L2A"));
}

#[test]
fn test_fields_keep_schema_order() {
    let extractor = DocumentExtractor::new(FieldSchema::faa_registry());
    let extraction = extractor
        .extract(&RawDocument::new(registered_page("Valid", "172S")))
        .unwrap();

    let names: Vec<&str> = extraction.fields.iter().map(|(name, _)| name).collect();
    let schema = FieldSchema::faa_registry();
    let expected: Vec<&str> = schema
        .fields()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn test_deregistered_page_marks_absent_fields() {
    let extractor = DocumentExtractor::new(FieldSchema::faa_registry());
    let extraction = extractor
        .extract(&RawDocument::new(deregistered_page()))
        .unwrap();

    assert_eq!(extraction.layout, DocumentLayout::SingleGroup);
    assert_eq!(extraction.fields.get("STATUS").cloned(), present("Deregistered"));
    assert_eq!(extraction.fields.get("MODEL").cloned(), present("PA-28-180"));
    assert_eq!(extraction.fields.get("COUNTY"), Some(&FieldValue::NotAvailable));
    assert_eq!(extraction.fields.not_available_count(), 8);
}

#[test]
fn test_labels_match_case_and_whitespace_insensitively() {
    let html = devkit_table(
        "Aircraft Description",
        &[["  TYPE\n   AIRCRAFT ", "Glider", "status", "Valid"]],
    );
    let schema = FieldSchema::new(
        "N-NUMBER",
        vec!["TYPE AIRCRAFT".to_string(), "STATUS".to_string()],
        "STATUS",
    )
    .unwrap();

    let extraction = DocumentExtractor::new(schema)
        .extract(&RawDocument::new(html))
        .unwrap();
    assert_eq!(extraction.fields.get("TYPE AIRCRAFT").cloned(), present("Glider"));
    assert_eq!(extraction.fields.get("STATUS").cloned(), present("Valid"));
}

#[test]
fn test_empty_value_cell_is_present_but_empty() {
    let html = devkit_table("Aircraft Description", &[["Status", "", "Model", "172S"]]);
    let schema = FieldSchema::new(
        "N-NUMBER",
        vec!["STATUS".to_string(), "MODEL".to_string()],
        "STATUS",
    )
    .unwrap();

    let extraction = DocumentExtractor::new(schema)
        .extract(&RawDocument::new(html))
        .unwrap();
    assert_eq!(extraction.fields.get("STATUS").cloned(), present(""));
}

#[test]
fn test_page_without_tables() {
    let extractor = DocumentExtractor::new(FieldSchema::faa_registry());
    assert_eq!(
        extractor.extract(&RawDocument::new(not_found_page())),
        Err(ExtractError::NoTables)
    );
    assert_eq!(
        extractor.extract(&RawDocument::new("")),
        Err(ExtractError::NoTables)
    );
}

#[test]
fn test_malformed_html_does_not_fail() {
    let html = format!(
        "<html><body><div>{}<table class=\"devkit-table\"><tr><td>Status<td>Valid",
        "<p><b>unclosed"
    );
    let schema = FieldSchema::new("N-NUMBER", vec!["STATUS".to_string()], "STATUS").unwrap();

    let extraction = DocumentExtractor::new(schema)
        .extract(&RawDocument::new(html))
        .unwrap();
    assert_eq!(extraction.fields.get("STATUS").cloned(), present("Valid"));
}
