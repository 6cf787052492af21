//! Checkpoint location
//!
//! There is no separate checkpoint file: the dataset itself is the
//! checkpoint. The resume point is the first record whose completion field is
//! empty, so a crash between flushes costs at most one batch of work.

use serde::Serialize;

use super::Dataset;

/// Index of the first record whose `completion_field` is empty.
///
/// Returns 0 when the column does not exist yet and the dataset length when
/// every record is complete.
pub fn first_incomplete(dataset: &Dataset, completion_field: &str) -> usize {
    let Some(column) = dataset.column_index(completion_field) else {
        return 0;
    };
    dataset
        .records()
        .iter()
        .position(|record| !record.is_complete(column))
        .unwrap_or(dataset.len())
}

/// Progress snapshot of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointStatus {
    /// Number of records
    pub total: usize,
    /// Records whose completion field is filled
    pub complete: usize,
    /// Where the next run starts
    pub resume_index: usize,
}

impl CheckpointStatus {
    /// Records still missing the completion field.
    pub fn remaining(&self) -> usize {
        self.total - self.complete
    }

    /// Whether every record is complete.
    pub fn is_done(&self) -> bool {
        self.resume_index >= self.total
    }
}

/// Count complete records and locate the resume point.
pub fn summarize(dataset: &Dataset, completion_field: &str) -> CheckpointStatus {
    let complete = match dataset.column_index(completion_field) {
        Some(column) => dataset
            .records()
            .iter()
            .filter(|record| record.is_complete(column))
            .count(),
        None => 0,
    };

    CheckpointStatus {
        total: dataset.len(),
        complete,
        resume_index: first_incomplete(dataset, completion_field),
    }
}
