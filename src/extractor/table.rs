//! Sub-table parsing and label/value alignment
//!
//! Registry tables are laid out as four columns: `label | value | label | value`.
//! After transposition every table splits into two halves at a fixed header
//! row; each half's first row holds the labels and its second row the values.

use scraper::{ElementRef, Node};

/// Transposed row index of the first half's labels
const FIRST_HALF_LABEL_ROW: usize = 0;

/// Transposed row index of the second half's labels
const SECOND_HALF_LABEL_ROW: usize = 2;

/// One `<table>` reduced to a grid of normalized cell texts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubTable {
    rows: Vec<Vec<String>>,
}

/// Labels and values collected from one sub-table, plus anything skipped.
#[derive(Debug, Clone, Default)]
pub struct AlignedPairs {
    /// `(label, value)` pairs in document order
    pub pairs: Vec<(String, String)>,
    /// Halves that could not be aligned
    pub warnings: Vec<String>,
}

impl SubTable {
    /// Build a sub-table from a grid of cell texts.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read a `<table>` element. Rows inside `<thead>` are column headers and are skipped.
    pub fn parse(table: ElementRef<'_>) -> Self {
        let mut rows = Vec::new();

        for row in table.descendants().filter_map(ElementRef::wrap) {
            if row.value().name() != "tr" || in_thead(row) {
                continue;
            }
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        Self { rows }
    }

    /// Number of body rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Columns become rows. Ragged rows are padded with empty cells.
    pub fn transpose(&self) -> Vec<Vec<String>> {
        let width = self.column_count();
        (0..width)
            .map(|col| {
                self.rows
                    .iter()
                    .map(|row| row.get(col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Split the transposed table into its two halves and pair each label with its value.
    pub fn align(&self) -> AlignedPairs {
        let transposed = self.transpose();
        let mut aligned = AlignedPairs::default();

        for (half, label_row) in [FIRST_HALF_LABEL_ROW, SECOND_HALF_LABEL_ROW]
            .into_iter()
            .enumerate()
        {
            let (Some(labels), Some(values)) =
                (transposed.get(label_row), transposed.get(label_row + 1))
            else {
                aligned.warnings.push(format!(
                    "half {} has no value column ({} columns present)",
                    half + 1,
                    transposed.len()
                ));
                continue;
            };

            aligned.pairs.extend(
                labels
                    .iter()
                    .zip(values)
                    .filter(|(label, _)| !label.is_empty())
                    .map(|(label, value)| (label.clone(), value.clone())),
            );
        }

        aligned
    }
}

fn in_thead(row: ElementRef<'_>) -> bool {
    row.ancestors().any(|node| match node.value() {
        Node::Element(element) => element.name() == "thead",
        _ => false,
    })
}

/// Trim and collapse internal runs of whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
