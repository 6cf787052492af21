//! Enrichment pipeline
//!
//! `INIT -> LOCATE_CHECKPOINT -> (PROCESSING_BATCH -> FLUSHING)* -> DONE`,
//! with `INTERRUPTED` reachable from a batch or a flush. A run with nothing
//! pending still goes through one `FLUSHING` when the output is a different
//! file or gained columns.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::{
    BatchScheduler, EnrichConfig, EnrichError, ProgressState, RunState, RunStatus, RunSummary,
};
use crate::dataset::{first_incomplete, DatasetError, DatasetLock, DatasetStore};
use crate::events::{EventSink, PipelineEvent, TracingEventSink};
use crate::extractor::DocumentExtractor;
use crate::fetcher::{FaaRegistryFetcher, RecordFetcher};
use crate::shutdown::{self, SharedShutdown};

/// One enrichment run over a dataset
pub struct EnrichPipeline {
    config: EnrichConfig,
    fetcher: Arc<dyn RecordFetcher>,
    extractor: DocumentExtractor,
    shutdown: Option<SharedShutdown>,
    events: Arc<dyn EventSink>,
}

impl EnrichPipeline {
    /// Create a pipeline that fetches through `fetcher`.
    ///
    /// Picks up the global shutdown handle when one is registered.
    pub fn new(config: EnrichConfig, fetcher: Arc<dyn RecordFetcher>) -> Self {
        let extractor = DocumentExtractor::new(config.schema().clone());
        Self {
            config,
            fetcher,
            extractor,
            shutdown: shutdown::get_global_shutdown(),
            events: Arc::new(TracingEventSink::new()),
        }
    }

    /// Create a pipeline against the FAA registry, honoring the configured timeout.
    ///
    /// # Errors
    /// [`EnrichError::Fetcher`] if the HTTP client cannot be built.
    pub fn for_faa_registry(config: EnrichConfig) -> Result<Self, EnrichError> {
        let fetcher = FaaRegistryFetcher::new(config.request_timeout())?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Locate data tables with a custom CSS selector.
    ///
    /// # Errors
    /// [`EnrichError::Config`] if the selector does not parse.
    pub fn with_table_selector(mut self, selector: &str) -> Result<Self, EnrichError> {
        self.extractor = self
            .extractor
            .with_table_selector(selector)
            .map_err(|e| EnrichError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Send events to `events` instead of the tracing sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Configuration of this pipeline.
    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Run until every window is flushed, a flush fails or shutdown is requested.
    ///
    /// A first shutdown request lets the batch in flight finish. A second one
    /// abandons it and flushes the rows it already wrote.
    ///
    /// # Errors
    /// - [`EnrichError::Config`] / [`EnrichError::Dataset`] before any work starts
    /// - [`EnrichError::Persistence`] when a flush fails
    /// - [`EnrichError::Interrupted`] when shutdown was requested
    pub async fn run(&self) -> Result<RunSummary, EnrichError> {
        self.config.validate()?;

        let span = info_span!(
            "enrich",
            input = %self.config.input_path().display(),
            output = %self.config.output_path().display(),
            endpoint = %self.fetcher.endpoint()
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunSummary, EnrichError> {
        let schema = self.config.schema();
        let mut state = StateTracker::new(self.events.clone());

        let _lock = DatasetLock::try_acquire(self.config.output_path())?;
        let store = DatasetStore::new(
            self.config.input_path(),
            self.config.output_path(),
            self.config.force(),
        );
        let mut dataset = store.load(schema.identifier_column())?;

        state.transition(RunState::LocateCheckpoint)?;
        let start = first_incomplete(&dataset, schema.completion_field());
        let loaded_columns = dataset.headers().len();
        let columns = dataset.bind_schema(schema);
        let columns_added = dataset.headers().len() > loaded_columns;
        let mut summary = RunSummary::new(dataset.len(), start);
        self.events.emit(&PipelineEvent::RunStarted {
            total_records: dataset.len(),
            start_index: start,
            batch_size: self.config.batch_size(),
        });

        let scheduler = BatchScheduler::new(
            self.fetcher.clone(),
            Arc::new(self.extractor.clone()),
            self.config.batch_size(),
            self.events.clone(),
        );

        // Nothing to fetch, but the output still has to exist with every schema column
        if start >= dataset.len() && (columns_added || store.source_path() != store.output_path()) {
            info!(
                output = %store.output_path().display(),
                columns_added,
                "Nothing pending - writing output once"
            );
            state.transition(RunState::Flushing)?;
            if let Err(error) = store.flush(&dataset) {
                return Err(self.persistence_failure(&mut state, summary, start, error));
            }
        }

        let mut progress = ProgressState::new(dataset.len() - start);
        let mut flushed_through = start;
        let mut first_gap: Option<usize> = None;
        let mut interrupted = false;

        for (number, window) in scheduler.windows(start, dataset.len()).enumerate() {
            let batch = number + 1;
            state.transition(RunState::ProcessingBatch)?;
            if self.shutdown_requested() {
                info!(batch, next_index = window.start, "Shutdown requested - not starting new batch");
                state.transition(RunState::Interrupted)?;
                interrupted = true;
                break;
            }

            let report = match &self.shutdown {
                Some(shutdown) => {
                    scheduler
                        .process_batch_until(
                            &mut dataset,
                            &columns,
                            window.clone(),
                            shutdown.wait_for_abandon(),
                        )
                        .await
                }
                None => {
                    scheduler
                        .process_batch(&mut dataset, &columns, window.clone())
                        .await
                }
            };
            for (_, outcome) in &report.outcomes {
                summary.record(outcome);
            }

            if report.abandoned {
                warn!(
                    batch,
                    finished = report.outcomes.len(),
                    abandoned = window.len() - report.outcomes.len(),
                    "Batch abandoned - flushing finished records"
                );
                state.transition(RunState::Interrupted)?;
                state.transition(RunState::Flushing)?;
                if let Err(error) = store.flush(&dataset) {
                    self.events.emit(&PipelineEvent::FlushFailed {
                        batch,
                        error: error.to_string(),
                    });
                    let next_index = first_gap.unwrap_or(flushed_through);
                    return Err(self.persistence_failure(&mut state, summary, next_index, error));
                }
                interrupted = true;
                break;
            }

            state.transition(RunState::Flushing)?;
            let flush_started = Instant::now();
            if let Err(error) = store.flush(&dataset) {
                self.events.emit(&PipelineEvent::FlushFailed {
                    batch,
                    error: error.to_string(),
                });
                state.transition(RunState::Interrupted)?;

                // One more attempt so the finished fetches are not lost
                state.transition(RunState::Flushing)?;
                let next_index = match store.flush(&dataset) {
                    Ok(()) => {
                        warn!(batch, "Final flush succeeded after failure");
                        first_incomplete(&dataset, schema.completion_field())
                    }
                    Err(retry_error) => {
                        self.events.emit(&PipelineEvent::FlushFailed {
                            batch,
                            error: retry_error.to_string(),
                        });
                        first_gap.unwrap_or(flushed_through)
                    }
                };
                return Err(self.persistence_failure(&mut state, summary, next_index, error));
            }

            summary.batches_flushed += 1;
            if first_gap.is_none() {
                first_gap = report
                    .outcomes
                    .iter()
                    .map(|(index, _)| *index)
                    .find(|index| {
                        dataset
                            .record(*index)
                            .is_some_and(|record| !record.is_complete(columns.completion()))
                    });
            }
            flushed_through = window.end;
            progress.record_batch(window.len());
            self.events.emit(&PipelineEvent::BatchFlushed {
                batch,
                window,
                elapsed: report.elapsed + flush_started.elapsed(),
                processed: progress.records_processed,
                total: progress.total_records,
                progress: progress.format_progress(),
            });
        }

        state.transition(RunState::Done)?;
        let next_index = first_incomplete(&dataset, schema.completion_field());
        let status = if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        summary.finish(status, next_index);
        self.events.emit(&PipelineEvent::RunFinished {
            summary: summary.clone(),
        });

        if interrupted {
            return Err(EnrichError::Interrupted(Box::new(summary)));
        }
        Ok(summary)
    }

    /// End the run after a flush that could not be completed.
    fn persistence_failure(
        &self,
        state: &mut StateTracker,
        mut summary: RunSummary,
        next_index: usize,
        source: DatasetError,
    ) -> EnrichError {
        if let Err(error) = state.transition(RunState::Done) {
            return error;
        }
        summary.finish(RunStatus::Failed, next_index);
        self.events.emit(&PipelineEvent::RunFinished {
            summary: summary.clone(),
        });
        EnrichError::Persistence {
            next_index,
            source,
            summary: Box::new(summary),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Validates and reports state changes of one run
struct StateTracker {
    state: RunState,
    events: Arc<dyn EventSink>,
}

impl StateTracker {
    fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            state: RunState::Init,
            events,
        }
    }

    fn transition(&mut self, next: RunState) -> Result<(), EnrichError> {
        if !self.state.can_transition_to(next) {
            return Err(EnrichError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.events.emit(&PipelineEvent::StateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
        Ok(())
    }
}
