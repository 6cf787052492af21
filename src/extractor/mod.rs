//! Registry document extraction
//!
//! Turns the HTML of one N-number result page into a [`FieldSet`]. The page
//! carries its data in one to three `devkit-table` sub-tables whose shape
//! varies with the registration state, so the document is first classified
//! into a [`DocumentLayout`] and each layout aligns its own sub-tables.
//!
//! Fields missing from the page resolve to [`FieldValue::NotAvailable`].
//! Only a page with no usable table at all is an [`ExtractError`].

use scraper::{Html, Selector};
use std::collections::HashMap;
use std::fmt;

use crate::fetcher::RawDocument;
use crate::{FieldSchema, FieldSet, FieldValue};

pub mod table;

pub use table::{collapse_whitespace, AlignedPairs, SubTable};

/// Selector of the data tables on the registry result page
pub const DEFAULT_TABLE_SELECTOR: &str = "table.devkit-table";

/// Errors during document extraction
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The document contains no data table
    #[error("no data tables found in document")]
    NoTables,

    /// Tables were found but none could be aligned into labels and values
    #[error("unexpected table shape: {0}")]
    UnexpectedShape(String),

    /// The table selector is not valid CSS
    #[error("invalid table selector '{0}'")]
    InvalidSelector(String),

    /// Parsing panicked on this document
    #[error("parser panicked: {0}")]
    Panicked(String),
}

/// Closed set of page layouts, keyed on how many sub-tables are present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLayout {
    /// One or two sub-tables; only the first carries registry data
    SingleGroup,
    /// Three or more sub-tables; the first three carry registry data
    ThreeGroup,
}

impl DocumentLayout {
    /// Classify a page by the number of sub-tables it contains.
    pub fn classify(table_count: usize) -> Option<Self> {
        match table_count {
            0 => None,
            1 | 2 => Some(DocumentLayout::SingleGroup),
            _ => Some(DocumentLayout::ThreeGroup),
        }
    }

    /// Number of leading sub-tables this layout reads.
    pub fn group_count(self) -> usize {
        match self {
            DocumentLayout::SingleGroup => 1,
            DocumentLayout::ThreeGroup => 3,
        }
    }

    /// Align the sub-tables of this layout and merge them into one label map.
    ///
    /// Later pairs override earlier ones, so the last table wins on duplicates.
    fn collect_labels(self, tables: &[SubTable]) -> (HashMap<String, String>, Vec<String>) {
        let mut labels = HashMap::new();
        let mut warnings = Vec::new();

        for (position, table) in tables.iter().take(self.group_count()).enumerate() {
            let aligned = table.align();
            warnings.extend(
                aligned
                    .warnings
                    .into_iter()
                    .map(|w| format!("table {}: {w}", position + 1)),
            );
            for (label, value) in aligned.pairs {
                labels.insert(normalize_label(&label), value);
            }
        }

        (labels, warnings)
    }
}

impl fmt::Display for DocumentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentLayout::SingleGroup => write!(f, "single-group"),
            DocumentLayout::ThreeGroup => write!(f, "three-group"),
        }
    }
}

/// Result of extracting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Layout the document was classified as
    pub layout: DocumentLayout,
    /// Schema fields, sentinel where absent
    pub fields: FieldSet,
    /// Sub-table halves that were skipped
    pub warnings: Vec<String>,
}

/// Extracts schema fields from registry result pages
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    schema: FieldSchema,
    table_selector: Selector,
}

impl DocumentExtractor {
    /// Create an extractor for `schema` using the default table selector.
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            table_selector: default_table_selector(),
        }
    }

    /// Use a custom CSS selector to locate the data tables.
    ///
    /// # Errors
    /// Returns [`ExtractError::InvalidSelector`] if `selector` does not parse.
    pub fn with_table_selector(mut self, selector: &str) -> Result<Self, ExtractError> {
        self.table_selector = Selector::parse(selector)
            .map_err(|_| ExtractError::InvalidSelector(selector.to_string()))?;
        Ok(self)
    }

    /// Schema this extractor fills.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Extract the schema fields from one document.
    ///
    /// # Errors
    /// [`ExtractError::NoTables`] when the page has no data table and
    /// [`ExtractError::UnexpectedShape`] when none of its tables yields a pair.
    pub fn extract(&self, document: &RawDocument) -> Result<Extraction, ExtractError> {
        let tables = self.sub_tables(document);
        let layout = DocumentLayout::classify(tables.len()).ok_or(ExtractError::NoTables)?;

        let (labels, warnings) = layout.collect_labels(&tables);
        if labels.is_empty() {
            return Err(ExtractError::UnexpectedShape(format!(
                "{} layout with {} table(s) produced no label/value pairs",
                layout,
                tables.len()
            )));
        }

        let fields = self
            .schema
            .fields()
            .iter()
            .map(|field| {
                let value = labels
                    .get(&normalize_label(field))
                    .map(|v| FieldValue::Present(v.clone()))
                    .unwrap_or(FieldValue::NotAvailable);
                (field.clone(), value)
            })
            .collect();

        Ok(Extraction {
            layout,
            fields: FieldSet::from_entries(fields),
            warnings,
        })
    }

    fn sub_tables(&self, document: &RawDocument) -> Vec<SubTable> {
        let html = Html::parse_document(document.text());
        let tables = html.select(&self.table_selector).map(SubTable::parse).collect();
        tables
    }
}

fn default_table_selector() -> Selector {
    Selector::parse(DEFAULT_TABLE_SELECTOR).expect("hardcoded selector is valid CSS")
}

/// Normalize a label for comparison: collapse whitespace, then title-case.
pub fn normalize_label(label: &str) -> String {
    title_case(&collapse_whitespace(label))
}

/// Title-case: a letter following a non-letter is upper-cased, every other letter lower-cased.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}
