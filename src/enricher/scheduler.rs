//! Batch scheduler
//!
//! Walks the dataset in fixed windows from the checkpoint. Every incomplete
//! record in a window gets its own fetch + extract + write unit; the units run
//! concurrently on the current task and each one holds the only `&mut` to its
//! row. The scheduler waits for the whole window before returning, and a
//! failing unit never cancels its siblings. Only an external stop signal can
//! abandon a window early; rows written before it stay written.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::{self, Future};
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dataset::{Dataset, FieldColumns, Record};
use crate::events::{EventSink, PipelineEvent};
use crate::extractor::{DocumentExtractor, DocumentLayout, ExtractError, Extraction};
use crate::fetcher::{FetcherError, RawDocument, RecordFetcher};

/// Why a record inside a window was not dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Completion field already filled
    AlreadyComplete,
    /// Identifier cell is blank
    EmptyIdentifier,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyComplete => write!(f, "already complete"),
            SkipReason::EmptyIdentifier => write!(f, "empty identifier"),
        }
    }
}

/// Result of one fetch + extract + write unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Fields written into the row
    Enriched {
        /// Layout of the fetched page
        layout: DocumentLayout,
        /// Schema fields resolved to the sentinel
        missing: usize,
    },
    /// Fetch failed; row unchanged
    FetchFailed(FetcherError),
    /// Extraction failed; row unchanged
    ExtractFailed(ExtractError),
    /// Not dispatched; row unchanged
    Skipped(SkipReason),
}

impl RecordOutcome {
    /// Whether the row was written.
    pub fn is_enriched(&self) -> bool {
        matches!(self, RecordOutcome::Enriched { .. })
    }
}

/// Outcomes of one window
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Row indices of the window
    pub window: Range<usize>,
    /// `(row index, outcome)` in row order
    pub outcomes: Vec<(usize, RecordOutcome)>,
    /// Time spent fetching and extracting
    pub elapsed: Duration,
    /// Stopped before every unit finished; `outcomes` covers the finished ones
    pub abandoned: bool,
}

impl BatchReport {
    /// Records written in this window.
    pub fn enriched(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_enriched()).count()
    }
}

/// Drives bounded concurrent fetch + extract over dataset windows
pub struct BatchScheduler {
    fetcher: Arc<dyn RecordFetcher>,
    extractor: Arc<DocumentExtractor>,
    batch_size: usize,
    events: Arc<dyn EventSink>,
}

impl BatchScheduler {
    /// Create a scheduler. A batch size of zero is treated as one.
    pub fn new(
        fetcher: Arc<dyn RecordFetcher>,
        extractor: Arc<DocumentExtractor>,
        batch_size: usize,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            batch_size: batch_size.max(1),
            events,
        }
    }

    /// Records per window.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Contiguous windows `[start, start + batch_size)` up to `len`.
    pub fn windows(&self, start: usize, len: usize) -> impl Iterator<Item = Range<usize>> {
        let batch_size = self.batch_size;
        (start..len)
            .step_by(batch_size)
            .map(move |from| from..(from + batch_size).min(len))
    }

    /// Process every record of `window` concurrently and wait for all of them.
    ///
    /// Only rows inside the window are touched.
    pub async fn process_batch(
        &self,
        dataset: &mut Dataset,
        columns: &FieldColumns,
        window: Range<usize>,
    ) -> BatchReport {
        self.process_batch_until(dataset, columns, window, future::pending())
            .await
    }

    /// Like [`process_batch`](Self::process_batch), but gives up on the units
    /// still running once `stop` resolves.
    ///
    /// Dropping an unfinished unit releases its row untouched.
    pub async fn process_batch_until<S>(
        &self,
        dataset: &mut Dataset,
        columns: &FieldColumns,
        window: Range<usize>,
        stop: S,
    ) -> BatchReport
    where
        S: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut units: FuturesUnordered<_> = dataset
            .slots_mut(window.clone())
            .map(|(index, record)| self.process_record(index, record, columns))
            .collect();
        let mut outcomes = Vec::with_capacity(units.len());
        let mut abandoned = false;

        tokio::pin!(stop);
        loop {
            tokio::select! {
                outcome = units.next() => match outcome {
                    Some(outcome) => outcomes.push(outcome),
                    None => break,
                },
                _ = &mut stop => {
                    abandoned = !units.is_empty();
                    break;
                }
            }
        }
        drop(units);
        outcomes.sort_by_key(|(index, _)| *index);

        BatchReport {
            window,
            outcomes,
            elapsed: started.elapsed(),
            abandoned,
        }
    }

    async fn process_record(
        &self,
        index: usize,
        record: &mut Record,
        columns: &FieldColumns,
    ) -> (usize, RecordOutcome) {
        if record.is_complete(columns.completion()) {
            return (index, self.skip(index, SkipReason::AlreadyComplete));
        }
        if record.identifier().is_empty() {
            return (index, self.skip(index, SkipReason::EmptyIdentifier));
        }

        let identifier = record.identifier().clone();
        let document = match self.fetcher.fetch(&identifier).await {
            Ok(document) => document,
            Err(error) => {
                self.events.emit(&PipelineEvent::FetchFailed {
                    index,
                    identifier,
                    error: error.clone(),
                });
                return (index, RecordOutcome::FetchFailed(error));
            }
        };

        let extraction = match extract_isolated(&self.extractor, &document) {
            Ok(extraction) => extraction,
            Err(error) => {
                self.events.emit(&PipelineEvent::ExtractFailed {
                    index,
                    identifier,
                    error: error.clone(),
                });
                return (index, RecordOutcome::ExtractFailed(error));
            }
        };
        drop(document);

        record.apply(columns, &extraction.fields);
        let missing = extraction.fields.not_available_count();
        self.events.emit(&PipelineEvent::RecordEnriched {
            index,
            identifier,
            layout: extraction.layout,
            missing,
        });

        (
            index,
            RecordOutcome::Enriched {
                layout: extraction.layout,
                missing,
            },
        )
    }

    fn skip(&self, index: usize, reason: SkipReason) -> RecordOutcome {
        self.events.emit(&PipelineEvent::RecordSkipped { index, reason });
        RecordOutcome::Skipped(reason)
    }
}

/// Run the extractor, turning a parser panic into an error for this document only.
fn extract_isolated(
    extractor: &DocumentExtractor,
    document: &RawDocument,
) -> Result<Extraction, ExtractError> {
    catch_unwind(AssertUnwindSafe(|| extractor.extract(document))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ExtractError::Panicked(message))
    })
}
