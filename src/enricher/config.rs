//! Run configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::EnrichError;
use crate::FieldSchema;

/// Records fetched concurrently per batch, and flushed together.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Upper bound on the batch size. The batch size is also the number of
/// requests in flight, so this caps the load put on the registry.
pub const MAX_BATCH_SIZE: usize = 256;

/// Configuration of one enrichment run
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    batch_size: usize,
    request_timeout: Option<Duration>,
    schema: FieldSchema,
    force: bool,
}

impl EnrichConfig {
    /// Enrich `input_path` in place with the FAA registry schema.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout: None,
            schema: FieldSchema::faa_registry(),
            force: false,
        }
    }

    /// Write the enriched dataset to a separate file.
    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    /// Set the number of records processed concurrently per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Bound each fetch by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Replace the field schema.
    pub fn with_schema(mut self, schema: FieldSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Ignore an existing separate output and start again from the input.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Input dataset.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Output dataset; the input itself when no output was set.
    pub fn output_path(&self) -> &Path {
        self.output_path.as_deref().unwrap_or(&self.input_path)
    }

    /// Records per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Per-request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Field schema.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Whether an existing output is ignored.
    pub fn force(&self) -> bool {
        self.force
    }

    /// Check the configuration before a run.
    ///
    /// # Errors
    /// [`EnrichError::Config`] for a batch size outside `1..=MAX_BATCH_SIZE`,
    /// a zero timeout or an empty input path.
    pub fn validate(&self) -> Result<(), EnrichError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(EnrichError::Config("input path cannot be empty".to_string()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(EnrichError::Config(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(EnrichError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
