//! Metrics tracking for the block processor.
//!
//! Provides atomic counters for monitoring event processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::types::BlockResult;

/// Metrics for the block processor.
#[derive(Debug)]
pub struct IndexerMetrics {
    /// Blocks committed.
    blocks_processed: AtomicU64,

    /// Blocks skipped because the cursor was already past them.
    blocks_skipped: AtomicU64,

    /// Contract events dispatched to handlers.
    events_processed: AtomicU64,

    /// Events that changed the store.
    events_applied: AtomicU64,

    /// Events absorbed as duplicates.
    events_duplicate: AtomicU64,

    /// Events absorbed because their event ID was unknown.
    events_orphaned: AtomicU64,

    /// Logs ignored (foreign contract or unrelated topic).
    logs_ignored: AtomicU64,

    /// Logs of known topics that failed to decode.
    decode_errors: AtomicU64,

    /// Metadata fetches that fell back to defaults.
    metadata_failures: AtomicU64,

    /// Total processing time in nanoseconds.
    total_processing_time_ns: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks_processed: AtomicU64::new(0),
            blocks_skipped: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            events_duplicate: AtomicU64::new(0),
            events_orphaned: AtomicU64::new(0),
            logs_ignored: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            metadata_failures: AtomicU64::new(0),
            total_processing_time_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a committed block.
    pub fn record_block(&self, result: &BlockResult, duration: Duration) {
        let duplicates = result
            .dropped
            .iter()
            .filter(|d| d.reason.is_duplicate())
            .count() as u64;
        let orphaned = result.dropped.len() as u64 - duplicates;

        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
        self.events_processed
            .fetch_add(result.events_processed as u64, Ordering::Relaxed);
        self.events_applied
            .fetch_add(result.applied as u64, Ordering::Relaxed);
        self.events_duplicate
            .fetch_add(duplicates, Ordering::Relaxed);
        self.events_orphaned.fetch_add(orphaned, Ordering::Relaxed);
        self.logs_ignored
            .fetch_add(result.ignored as u64, Ordering::Relaxed);
        self.decode_errors
            .fetch_add(result.decode_errors as u64, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Records a block that was already committed.
    pub fn record_skipped_block(&self) {
        self.blocks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a metadata fetch that fell back to defaults.
    pub fn record_metadata_failure(&self) {
        self.metadata_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of blocks committed.
    #[must_use]
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    /// Returns the number of blocks skipped.
    #[must_use]
    pub fn blocks_skipped(&self) -> u64 {
        self.blocks_skipped.load(Ordering::Relaxed)
    }

    /// Returns the number of events dispatched.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    /// Returns the number of events applied.
    #[must_use]
    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    /// Returns the number of duplicate events absorbed.
    #[must_use]
    pub fn events_duplicate(&self) -> u64 {
        self.events_duplicate.load(Ordering::Relaxed)
    }

    /// Returns the number of events dropped for an unknown event ID.
    #[must_use]
    pub fn events_orphaned(&self) -> u64 {
        self.events_orphaned.load(Ordering::Relaxed)
    }

    /// Returns the number of ignored logs.
    #[must_use]
    pub fn logs_ignored(&self) -> u64 {
        self.logs_ignored.load(Ordering::Relaxed)
    }

    /// Returns the number of decode errors.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of metadata fallbacks.
    #[must_use]
    pub fn metadata_failures(&self) -> u64 {
        self.metadata_failures.load(Ordering::Relaxed)
    }

    /// Returns the average processing time per committed block.
    #[must_use]
    pub fn average_block_time(&self) -> Duration {
        let count = self.blocks_processed();
        if count == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_processing_time_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / count)
    }

    /// Returns the events per second since start.
    #[must_use]
    pub fn events_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.events_processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_processed: self.blocks_processed(),
            blocks_skipped: self.blocks_skipped(),
            events_processed: self.events_processed(),
            events_applied: self.events_applied(),
            events_duplicate: self.events_duplicate(),
            events_orphaned: self.events_orphaned(),
            logs_ignored: self.logs_ignored(),
            decode_errors: self.decode_errors(),
            metadata_failures: self.metadata_failures(),
            average_block_time: self.average_block_time(),
            events_per_second: self.events_per_second(),
        }
    }
}

/// A point-in-time snapshot of indexer metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Blocks committed.
    pub blocks_processed: u64,
    /// Blocks skipped.
    pub blocks_skipped: u64,
    /// Events dispatched.
    pub events_processed: u64,
    /// Events applied.
    pub events_applied: u64,
    /// Duplicate events absorbed.
    pub events_duplicate: u64,
    /// Events dropped for an unknown event ID.
    pub events_orphaned: u64,
    /// Logs ignored.
    pub logs_ignored: u64,
    /// Decode errors.
    pub decode_errors: u64,
    /// Metadata fallbacks.
    pub metadata_failures: u64,
    /// Average time per block.
    pub average_block_time: Duration,
    /// Events per second.
    pub events_per_second: f64,
}
