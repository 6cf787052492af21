//! Batch scheduling and run orchestration
//!
//! The enricher wires the other components into one resumable run:
//!
//! 1. **Checkpoint**: load the dataset and find the first incomplete record
//! 2. **Batches**: walk fixed windows from there with [`scheduler::BatchScheduler`]
//! 3. **Flush**: write the full table after every window
//! 4. **Stop**: on shutdown, finish the window in flight, flush, and report
//!    the resume point in [`EnrichError::Interrupted`]. A second request
//!    abandons the window and flushes the rows it already wrote
//!
//! # Error Handling
//!
//! Fetch and extraction failures are recovered per record and only show up in
//! the [`RunSummary`]. A failed flush or an interruption ends the run with an
//! [`EnrichError`]; the file on disk still holds every batch flushed before it.

pub mod config;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod scheduler;

pub use config::{EnrichConfig, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use job::{RunState, RunStatus, RunSummary};
pub use pipeline::EnrichPipeline;
pub use progress::ProgressState;
pub use scheduler::{BatchReport, BatchScheduler, RecordOutcome, SkipReason};

use crate::dataset::DatasetError;
use crate::fetcher::FetcherError;
use crate::SchemaError;

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid field schema
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Dataset could not be loaded or locked
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// HTTP client could not be built
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// A flush failed; records before `next_index` are on disk
    #[error("failed to persist dataset, resume from record {next_index}: {source}")]
    Persistence {
        /// No record before this index is lost
        next_index: usize,
        /// Underlying failure
        #[source]
        source: DatasetError,
        /// Counts up to the failure, status `failed`
        summary: Box<RunSummary>,
    },

    /// Shutdown requested; everything processed so far was flushed
    #[error("run interrupted, resume from record {}", .0.next_index)]
    Interrupted(Box<RunSummary>),

    /// The run loop attempted an illegal state change
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },
}

impl EnrichError {
    /// Summary of a run that got past loading the dataset.
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            EnrichError::Interrupted(summary) => Some(summary.as_ref()),
            EnrichError::Persistence { summary, .. } => Some(summary.as_ref()),
            _ => None,
        }
    }
}
