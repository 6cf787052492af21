//! In-memory dataset and its durable CSV mirror
//!
//! The [`Dataset`] is an arena of [`Record`] slots addressed by row index. A
//! batch hands out disjoint `&mut Record` slots for its window, so concurrent
//! units never share a row and no locking is needed.

use std::ops::Range;

use crate::{FieldSchema, FieldSet, Identifier};

pub mod checkpoint;
pub mod lock;
pub mod store;

pub use checkpoint::{first_incomplete, CheckpointStatus};
pub use lock::DatasetLock;
pub use store::DatasetStore;

/// Dataset errors
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV read or write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// The identifier column is not in the header
    #[error("identifier column '{0}' not found in dataset header")]
    MissingIdentifierColumn(String),

    /// A row has more cells than the header
    #[error("row {row} has {cells} cells but the header has {columns}")]
    MalformedRow {
        /// Zero-based data row index
        row: usize,
        /// Cells in the row
        cells: usize,
        /// Columns in the header
        columns: usize,
    },

    /// Another run holds the output lock
    #[error("lock error: {0}")]
    LockError(String),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// One dataset row: its identifier plus every cell, including unrelated input columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    identifier: Identifier,
    cells: Vec<String>,
}

impl Record {
    fn new(identifier: Identifier, cells: Vec<String>) -> Self {
        Self { identifier, cells }
    }

    /// Identifier of this row.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Cell text at `column`, empty when out of range.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// All cells in header order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Whether the cell at `completion_column` holds a value.
    pub fn is_complete(&self, completion_column: usize) -> bool {
        !self.cell(completion_column).trim().is_empty()
    }

    /// Write an extracted field set into this row.
    pub fn apply(&mut self, columns: &FieldColumns, fields: &FieldSet) {
        for (name, value) in fields.iter() {
            if let Some(column) = columns.column_of(name) {
                if let Some(cell) = self.cells.get_mut(column) {
                    *cell = value.as_cell().to_string();
                }
            }
        }
    }
}

/// Column positions of the schema fields inside a bound dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldColumns {
    fields: Vec<(String, usize)>,
    completion: usize,
}

impl FieldColumns {
    /// Column index of a schema field.
    pub fn column_of(&self, field: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, column)| *column)
    }

    /// Column index of the completion field.
    pub fn completion(&self) -> usize {
        self.completion
    }
}

/// Header plus ordered records, loaded fully into memory for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    identifier_column: usize,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset from a header and raw rows.
    ///
    /// Short rows are padded with empty cells.
    ///
    /// # Errors
    /// [`DatasetError::MissingIdentifierColumn`] if `identifier_column` is not a
    /// header, [`DatasetError::MalformedRow`] if a row is wider than the header.
    pub fn from_rows(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        identifier_column: &str,
    ) -> DatasetResult<Self> {
        let id_index = headers
            .iter()
            .position(|h| h == identifier_column)
            .ok_or_else(|| DatasetError::MissingIdentifierColumn(identifier_column.to_string()))?;

        let width = headers.len();
        let mut records = Vec::with_capacity(rows.len());
        for (row_index, mut cells) in rows.into_iter().enumerate() {
            if cells.len() > width {
                return Err(DatasetError::MalformedRow {
                    row: row_index,
                    cells: cells.len(),
                    columns: width,
                });
            }
            cells.resize(width, String::new());
            let identifier = Identifier::new(&cells[id_index]);
            records.push(Record::new(identifier, cells));
        }

        Ok(Self {
            headers,
            identifier_column: id_index,
            records,
        })
    }

    /// Column names in order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of the identifier column.
    pub fn identifier_column(&self) -> usize {
        self.identifier_column
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Record at `index`.
    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Make sure every schema field has a column and return their positions.
    ///
    /// Missing columns are appended after the existing header with empty cells.
    pub fn bind_schema(&mut self, schema: &FieldSchema) -> FieldColumns {
        let mut fields = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let column = match self.column_index(field) {
                Some(column) => column,
                None => {
                    self.headers.push(field.clone());
                    for record in &mut self.records {
                        record.cells.push(String::new());
                    }
                    self.headers.len() - 1
                }
            };
            fields.push((field.clone(), column));
        }

        let completion = fields
            .iter()
            .find(|(name, _)| name == schema.completion_field())
            .map(|(_, column)| *column)
            .unwrap_or(self.identifier_column);

        FieldColumns { fields, completion }
    }

    /// Exclusive slots for the rows in `window`, each paired with its index.
    ///
    /// The window is clamped to the dataset length.
    pub fn slots_mut(&mut self, window: Range<usize>) -> impl Iterator<Item = (usize, &mut Record)> {
        let end = window.end.min(self.records.len());
        let start = window.start.min(end);
        self.records[start..end]
            .iter_mut()
            .enumerate()
            .map(move |(offset, record)| (start + offset, record))
    }
}
