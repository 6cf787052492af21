//! CLI error types and conversions

use crate::dataset::DatasetError;
use crate::enricher::EnrichError;
use crate::fetcher::FetcherError;
use crate::SchemaError;

pub use crate::shutdown::EXIT_INTERRUPTED;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Enrichment run error
    #[error("enrichment error: {0}")]
    EnrichError(#[from] EnrichError),

    /// Dataset error
    #[error("dataset error: {0}")]
    DatasetError(#[from] DatasetError),

    /// Schema error
    #[error("schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::EnrichError(EnrichError::Interrupted(_)) => EXIT_INTERRUPTED,
            CliError::InvalidArgument(_) | CliError::SchemaError(_) => 2,
            CliError::EnrichError(EnrichError::Config(_) | EnrichError::Schema(_)) => 2,
            _ => 1,
        }
    }
}
