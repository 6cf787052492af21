//! Pipeline events and sinks
//!
//! Components report what happens through an injected [`EventSink`] scoped to
//! one run instead of logging through process-wide state. The default
//! [`TracingEventSink`] turns events into `tracing` records and metrics.

use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::enricher::{RunState, RunSummary, SkipReason};
use crate::extractor::{DocumentLayout, ExtractError};
use crate::fetcher::FetcherError;
use crate::metrics;
use crate::Identifier;

/// Something that happened during a run
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Dataset loaded and checkpoint located
    RunStarted {
        /// Records in the dataset
        total_records: usize,
        /// First incomplete record
        start_index: usize,
        /// Records per batch
        batch_size: usize,
    },
    /// Pipeline moved to a new state
    StateChanged {
        /// Previous state
        from: RunState,
        /// New state
        to: RunState,
    },
    /// Record fetched, extracted and written
    RecordEnriched {
        /// Row index
        index: usize,
        /// Record identifier
        identifier: Identifier,
        /// Layout of the fetched page
        layout: DocumentLayout,
        /// Schema fields not found on the page
        missing: usize,
    },
    /// Fetch failed; the record stays incomplete
    FetchFailed {
        /// Row index
        index: usize,
        /// Record identifier
        identifier: Identifier,
        /// Transport failure
        error: FetcherError,
    },
    /// Extraction failed; the record stays incomplete
    ExtractFailed {
        /// Row index
        index: usize,
        /// Record identifier
        identifier: Identifier,
        /// Extraction failure
        error: ExtractError,
    },
    /// Record inside a window was not dispatched
    RecordSkipped {
        /// Row index
        index: usize,
        /// Why it was not dispatched
        reason: SkipReason,
    },
    /// Batch processed and written to disk
    BatchFlushed {
        /// One-based batch number within the run
        batch: usize,
        /// Row indices of the batch
        window: Range<usize>,
        /// Fetch, extract and flush time
        elapsed: Duration,
        /// Records walked so far
        processed: usize,
        /// Records to walk in this run
        total: usize,
        /// Formatted progress line
        progress: String,
    },
    /// Writing the dataset failed
    FlushFailed {
        /// One-based batch number within the run
        batch: usize,
        /// Failure text
        error: String,
    },
    /// Run reached a terminal state
    RunFinished {
        /// Final totals
        summary: RunSummary,
    },
}

/// Receives pipeline events
pub trait EventSink: Send + Sync {
    /// Handle one event. Must not block.
    fn emit(&self, event: &PipelineEvent);
}

/// Logs events with `tracing` and records metrics
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Create the sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                total_records,
                start_index,
                batch_size,
            } => {
                info!(
                    total_records,
                    start_index,
                    batch_size,
                    pending = total_records.saturating_sub(*start_index),
                    "Enrichment run started"
                );
            }
            PipelineEvent::StateChanged { from, to } => {
                debug!(from = %from, to = %to, "Run state changed");
            }
            PipelineEvent::RecordEnriched {
                index,
                identifier,
                layout,
                missing,
            } => {
                metrics::record_enriched(*missing);
                debug!(index, identifier = %identifier, layout = %layout, missing, "Record enriched");
            }
            PipelineEvent::FetchFailed {
                index,
                identifier,
                error,
            } => {
                metrics::record_failed("fetch");
                warn!(index, identifier = %identifier, error = %error, "Fetch failed, record left incomplete");
            }
            PipelineEvent::ExtractFailed {
                index,
                identifier,
                error,
            } => {
                metrics::record_failed("extract");
                warn!(index, identifier = %identifier, error = %error, "Extraction failed, record left incomplete");
            }
            PipelineEvent::RecordSkipped { index, reason } => {
                debug!(index, reason = %reason, "Record skipped");
            }
            PipelineEvent::BatchFlushed {
                batch,
                window,
                elapsed,
                progress,
                ..
            } => {
                metrics::record_batch_flushed(*elapsed);
                info!(
                    batch,
                    start = window.start,
                    end = window.end,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "{progress}"
                );
            }
            PipelineEvent::FlushFailed { batch, error } => {
                metrics::record_flush_failure();
                error!(batch, error = %error, "Failed to flush dataset");
            }
            PipelineEvent::RunFinished { summary } => {
                info!(
                    status = ?summary.status,
                    enriched = summary.enriched,
                    fetch_failed = summary.fetch_failed,
                    extract_failed = summary.extract_failed,
                    skipped = summary.skipped,
                    batches = summary.batches_flushed,
                    next_index = summary.next_index,
                    total_records = summary.total_records,
                    "Enrichment run finished"
                );
            }
        }
    }
}

/// Forwards every event to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Create an empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &PipelineEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
