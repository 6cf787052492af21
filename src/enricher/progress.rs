//! Per-batch progress reporting
//!
//! Computes percentage, rate and remaining time over the records a run has
//! to walk, and formats the `[PROGRESS]` line attached to every flushed batch.

use std::time::{Duration, Instant};

/// Progress of one run over its pending records.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Records walked so far, including failures and skips.
    pub records_processed: usize,
    /// Records from the checkpoint to the end of the dataset.
    pub total_records: usize,
    /// Batches flushed so far.
    pub batches: usize,
    /// Timestamp when the run started.
    pub start_time: Instant,
    /// Records per second since the start.
    pub current_rate: f64,
}

impl ProgressState {
    /// Track `total_records` pending records.
    pub fn new(total_records: usize) -> Self {
        Self {
            records_processed: 0,
            total_records,
            batches: 0,
            start_time: Instant::now(),
            current_rate: 0.0,
        }
    }

    /// Count one finished batch of `records` records.
    pub fn record_batch(&mut self, records: usize) {
        self.records_processed = self
            .records_processed
            .saturating_add(records)
            .min(self.total_records);
        self.batches += 1;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.records_processed as f64 / elapsed;
        }
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        (self.records_processed as f64 / self.total_records as f64) * 100.0
    }

    /// Remaining time at the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.current_rate <= 0.0 {
            return None;
        }
        let remaining = self.total_records.saturating_sub(self.records_processed);
        if remaining == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / self.current_rate))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Processed {}/{} records - {:.1}% complete (batch {})",
            self.records_processed,
            self.total_records,
            self.percentage(),
            self.batches
        )];

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.1} records/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
