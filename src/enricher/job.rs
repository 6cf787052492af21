//! Run state machine and run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::scheduler::{RecordOutcome, SkipReason};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Configuration validated, nothing loaded yet
    Init,
    /// Dataset loaded, looking for the first incomplete record
    LocateCheckpoint,
    /// Fetching and extracting one window
    ProcessingBatch,
    /// Writing the dataset to disk
    Flushing,
    /// Shutdown requested or flush failed
    Interrupted,
    /// Terminal
    Done,
}

impl RunState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, LocateCheckpoint)
                | (LocateCheckpoint, ProcessingBatch)
                | (LocateCheckpoint, Done)
                | (LocateCheckpoint, Flushing)
                | (ProcessingBatch, Flushing)
                | (ProcessingBatch, Interrupted)
                | (Flushing, ProcessingBatch)
                | (Flushing, Done)
                | (Flushing, Interrupted)
                | (Interrupted, Flushing)
                | (Interrupted, Done)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        self == RunState::Done
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::LocateCheckpoint => "locate_checkpoint",
            RunState::ProcessingBatch => "processing_batch",
            RunState::Flushing => "flushing",
            RunState::Interrupted => "interrupted",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still running
    #[default]
    Running,
    /// Every window was processed and flushed
    Completed,
    /// Stopped early on shutdown request
    Interrupted,
    /// Stopped because a flush failed
    Failed,
}

/// Totals of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// How the run ended
    pub status: RunStatus,
    /// Records in the dataset
    pub total_records: usize,
    /// Checkpoint the run started from
    pub start_index: usize,
    /// Checkpoint the next run starts from
    pub next_index: usize,
    /// Batches written to disk
    pub batches_flushed: usize,
    /// Records fetched and extracted
    pub enriched: usize,
    /// Records whose fetch failed
    pub fetch_failed: usize,
    /// Records whose document could not be extracted
    pub extract_failed: usize,
    /// Records inside a window with a blank identifier
    pub skipped: usize,
    /// Records inside a window that were already complete
    pub already_complete: usize,
    /// Schema fields resolved to the sentinel across enriched records
    pub fields_not_available: usize,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Start a summary for a dataset of `total_records` resuming at `start_index`.
    pub fn new(total_records: usize, start_index: usize) -> Self {
        Self {
            status: RunStatus::Running,
            total_records,
            start_index,
            next_index: start_index,
            batches_flushed: 0,
            enriched: 0,
            fetch_failed: 0,
            extract_failed: 0,
            skipped: 0,
            already_complete: 0,
            fields_not_available: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Count one record outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Enriched { missing, .. } => {
                self.enriched += 1;
                self.fields_not_available += missing;
            }
            RecordOutcome::FetchFailed(_) => self.fetch_failed += 1,
            RecordOutcome::ExtractFailed(_) => self.extract_failed += 1,
            RecordOutcome::Skipped(SkipReason::EmptyIdentifier) => self.skipped += 1,
            RecordOutcome::Skipped(SkipReason::AlreadyComplete) => self.already_complete += 1,
        }
    }

    /// Records whose fetch or extraction failed.
    pub fn failed(&self) -> usize {
        self.fetch_failed + self.extract_failed
    }

    /// Close the summary.
    pub fn finish(&mut self, status: RunStatus, next_index: usize) {
        self.status = status;
        self.next_index = next_index;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
