//! Unit tests for checkpoint location

use aircraft_enricher::dataset::checkpoint::summarize;
use aircraft_enricher::dataset::{first_incomplete, Dataset};

fn dataset(statuses: &[&str]) -> Dataset {
    let rows = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| vec![format!("N{i}"), "x".to_string(), status.to_string()])
        .collect();
    Dataset::from_rows(
        vec!["N-NUMBER".to_string(), "NOTE".to_string(), "STATUS".to_string()],
        rows,
        "N-NUMBER",
    )
    .unwrap()
}

#[test]
fn test_complete_prefix_resumes_after_it() {
    for complete in 0..=5 {
        let statuses: Vec<&str> = (0..5)
            .map(|i| if i < complete { "Valid" } else { "" })
            .collect();
        assert_eq!(first_incomplete(&dataset(&statuses), "STATUS"), complete);
    }
}

#[test]
fn test_gap_wins_over_later_complete_records() {
    let data = dataset(&["Valid", "", "Valid", "Valid"]);
    assert_eq!(first_incomplete(&data, "STATUS"), 1);

    let status = summarize(&data, "STATUS");
    assert_eq!(status.complete, 3);
    assert_eq!(status.remaining(), 1);
    assert_eq!(status.resume_index, 1);
    assert!(!status.is_done());
}

#[test]
fn test_whitespace_only_is_incomplete() {
    let data = dataset(&["Valid", "   ", "Valid"]);
    assert_eq!(first_incomplete(&data, "STATUS"), 1);
}

#[test]
fn test_sentinel_counts_as_complete() {
    let data = dataset(&["N/A", "Valid"]);
    assert_eq!(first_incomplete(&data, "STATUS"), 2);
    assert!(summarize(&data, "STATUS").is_done());
}

#[test]
fn test_missing_column_starts_at_zero() {
    let data = dataset(&["Valid"]);
    assert_eq!(first_incomplete(&data, "MODEL"), 0);
}

#[test]
fn test_empty_dataset() {
    let data = dataset(&[]);
    assert_eq!(first_incomplete(&data, "STATUS"), 0);
    assert!(summarize(&data, "STATUS").is_done());
}
