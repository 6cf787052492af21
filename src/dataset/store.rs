//! Durable CSV mirror of the dataset
//!
//! `flush` stages the whole table in a temp file next to the output, syncs it
//! and renames it over the target, so a reader never sees a half-written row.

use csv::{ReaderBuilder, StringRecord, Writer};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Dataset, DatasetError, DatasetResult};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Loads the dataset at the start of a run and flushes it after every batch
#[derive(Debug, Clone)]
pub struct DatasetStore {
    input_path: PathBuf,
    output_path: PathBuf,
    force: bool,
}

impl DatasetStore {
    /// Create a store reading `input_path` and writing `output_path`.
    ///
    /// With `force` set, an existing output is ignored and the run starts
    /// from the input again.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            force,
        }
    }

    /// Input file.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Output file.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// File `load` reads: a previous run's separate output when present, else the input.
    pub fn source_path(&self) -> &Path {
        if !self.force && self.output_path != self.input_path && self.output_path.exists() {
            &self.output_path
        } else {
            &self.input_path
        }
    }

    /// Read the durable table into memory.
    ///
    /// # Errors
    /// IO and CSV errors, a missing identifier column or a row wider than the header.
    pub fn load(&self, identifier_column: &str) -> DatasetResult<Dataset> {
        let source = self.source_path();
        debug!(path = %source.display(), "Loading dataset");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(source)
            .map_err(|e| map_csv_error(source, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| map_csv_error(source, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while reader
            .read_record(&mut record)
            .map_err(|e| map_csv_error(source, e))?
        {
            rows.push(record.iter().map(str::to_string).collect());
        }

        let dataset = Dataset::from_rows(headers, rows, identifier_column)?;
        info!(
            path = %source.display(),
            records = dataset.len(),
            columns = dataset.headers().len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Write the whole dataset to the output file.
    ///
    /// # Errors
    /// Returns [`DatasetError::IoError`] or [`DatasetError::CsvError`]; the
    /// previous output is left untouched on failure.
    pub fn flush(&self, dataset: &Dataset) -> DatasetResult<()> {
        let path = &self.output_path;
        debug!(path = %path.display(), records = dataset.len(), "Flushing dataset");

        let parent_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent_dir).map_err(|e| DatasetError::IoError(e.to_string()))?;

        let temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| DatasetError::IoError(format!("Failed to create temp file: {e}")))?;

        let mut writer = Writer::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, temp_file));
        writer
            .write_record(dataset.headers())
            .map_err(|e| DatasetError::CsvError(e.to_string()))?;
        for record in dataset.records() {
            writer
                .write_record(record.cells())
                .map_err(|e| DatasetError::CsvError(e.to_string()))?;
        }

        let buffered = writer
            .into_inner()
            .map_err(|e| DatasetError::IoError(format!("Failed to flush CSV writer: {e}")))?;
        let mut temp_file = buffered
            .into_inner()
            .map_err(|e| DatasetError::IoError(format!("Failed to flush buffer: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| DatasetError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| DatasetError::IoError(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(path)
            .map_err(|e| DatasetError::IoError(format!("Failed to persist temp file: {e}")))?;

        // Make the rename durable
        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        debug!(path = %path.display(), "Dataset flushed");
        Ok(())
    }
}

fn map_csv_error(path: &Path, error: csv::Error) -> DatasetError {
    if let csv::ErrorKind::Io(io) = error.kind() {
        DatasetError::IoError(format!("{}: {io}", path.display()))
    } else {
        DatasetError::CsvError(format!("{}: {error}", path.display()))
    }
}
