//! # Aircraft Enricher Library
//!
//! Enriches a tabular dataset of aircraft registration numbers (N-numbers) with
//! registry details fetched one record at a time from the FAA aircraft
//! inquiry service. The job is long-running and built to be interrupted: the
//! dataset is flushed to disk after every batch, and the next run picks up at
//! the first record that is still missing its completion field.
//!
//! ## Quick Start
//!
//! ```no_run
//! use aircraft_enricher::enricher::{EnrichConfig, EnrichPipeline};
//! use aircraft_enricher::fetcher::FaaRegistryFetcher;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EnrichConfig::new("data/aircraft.csv").with_batch_size(20);
//! let fetcher = FaaRegistryFetcher::new(config.request_timeout())?;
//!
//! let summary = EnrichPipeline::new(config, Arc::new(fetcher)).run().await?;
//! println!("resume index after run: {}", summary.next_index);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - One network request per identifier, typed transport failures
//! - [`extractor`] - HTML registry page to [`FieldSet`] extraction
//! - [`dataset`] - In-memory table, durable CSV mirror and checkpoint location
//! - [`enricher`] - Batch scheduling, run state machine and pipeline wiring
//! - [`events`] - Injected observability sink
//! - [`shutdown`] - Cooperative interruption

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Dataset store and checkpoint location
pub mod dataset;

/// Batch scheduling and run orchestration
pub mod enricher;

/// Pipeline events and sinks
pub mod events;

/// Registry document extraction
pub mod extractor;

/// Record fetchers
pub mod fetcher;

/// Metrics recording and exporter setup
pub mod metrics;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use dataset::{Dataset, DatasetStore, Record};
pub use enricher::{EnrichConfig, EnrichError, EnrichPipeline, RunSummary};

/// Placeholder written for a schema field the registry page did not contain.
pub const NOT_AVAILABLE: &str = "N/A";

/// Opaque key of one remote record (an aircraft registration number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier, trimming surrounding whitespace.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Value of one extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Value read from the registry page (may be empty if the page cell was empty)
    Present(String),
    /// Field was not found in the page
    NotAvailable,
}

impl FieldValue {
    /// Text written into the dataset cell.
    pub fn as_cell(&self) -> &str {
        match self {
            FieldValue::Present(value) => value,
            FieldValue::NotAvailable => NOT_AVAILABLE,
        }
    }

    /// Whether this is the "not available" sentinel.
    pub fn is_not_available(&self) -> bool {
        matches!(self, FieldValue::NotAvailable)
    }
}

/// Fields extracted for one identifier, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    entries: Vec<(String, FieldValue)>,
}

impl FieldSet {
    /// Build a field set from ordered `(name, value)` pairs.
    pub fn from_entries(entries: Vec<(String, FieldValue)>) -> Self {
        Self { entries }
    }

    /// Look up a field by its schema name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Iterate over fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the field set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields resolved to the sentinel.
    pub fn not_available_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, value)| value.is_not_available())
            .count()
    }
}

/// Schema validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// No fields were given
    #[error("field schema must contain at least one field")]
    Empty,

    /// A field name appears twice
    #[error("duplicate field in schema: {0}")]
    DuplicateField(String),

    /// Completion field is not part of the field list
    #[error("completion field '{0}' is not one of the schema fields")]
    UnknownCompletionField(String),

    /// Identifier column is also listed as a field
    #[error("identifier column '{0}' cannot also be an extracted field")]
    IdentifierIsField(String),

    /// A field or column name is blank
    #[error("field and column names must not be blank")]
    BlankName,
}

/// Ordered set of fields to extract, plus the identifier and completion columns.
///
/// Deserializing runs the same checks as [`FieldSchema::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSchema")]
pub struct FieldSchema {
    identifier_column: String,
    fields: Vec<String>,
    completion_field: String,
}

#[derive(Deserialize)]
struct UncheckedSchema {
    identifier_column: String,
    fields: Vec<String>,
    completion_field: String,
}

impl TryFrom<UncheckedSchema> for FieldSchema {
    type Error = SchemaError;

    fn try_from(raw: UncheckedSchema) -> Result<Self, Self::Error> {
        FieldSchema::new(raw.identifier_column, raw.fields, raw.completion_field)
    }
}

impl FieldSchema {
    /// Default identifier column of the FAA master file.
    pub const DEFAULT_IDENTIFIER_COLUMN: &'static str = "N-NUMBER";

    /// Default completion field.
    pub const DEFAULT_COMPLETION_FIELD: &'static str = "STATUS";

    /// Create and validate a schema.
    pub fn new(
        identifier_column: impl Into<String>,
        fields: Vec<String>,
        completion_field: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let identifier_column = identifier_column.into().trim().to_string();
        let fields: Vec<String> = fields.into_iter().map(|f| f.trim().to_string()).collect();
        let completion_field = completion_field.into().trim().to_string();

        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        if identifier_column.is_empty() || fields.iter().any(|f| f.is_empty()) {
            return Err(SchemaError::BlankName);
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(SchemaError::DuplicateField(field.clone()));
            }
        }
        if seen.contains(identifier_column.as_str()) {
            return Err(SchemaError::IdentifierIsField(identifier_column));
        }
        if !seen.contains(completion_field.as_str()) {
            return Err(SchemaError::UnknownCompletionField(completion_field));
        }

        Ok(Self {
            identifier_column,
            fields,
            completion_field,
        })
    }

    /// Fields scraped from the FAA N-number inquiry page.
    pub fn faa_registry() -> Self {
        let fields = [
            "STATUS",
            "MANUFACTURER NAME",
            "MODEL",
            "TYPE AIRCRAFT",
            "TYPE ENGINE",
            "PENDING NUMBER CHANGE",
            "DATE CHANGE AUTHORIZED",
            "TYPE REGISTRATION",
            "COUNTY",
            "ENGINE MANUFACTURER",
            "ENGINE MODEL",
        ];
        Self {
            identifier_column: Self::DEFAULT_IDENTIFIER_COLUMN.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            completion_field: Self::DEFAULT_COMPLETION_FIELD.to_string(),
        }
    }

    /// Name of the identifier column.
    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    /// Field names in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Name of the field whose emptiness marks a record as incomplete.
    pub fn completion_field(&self) -> &str {
        &self.completion_field
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::faa_registry()
    }
}
