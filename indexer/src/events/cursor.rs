//! Ledger cursor for tracking block processing progress.
//!
//! The cursor is committed together with a block's entity writes, so a
//! restart resumes at the first block that was not fully persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cursor over the ordered block stream.
///
/// `last_block` is `None` until the first block commits, so that block 0
/// is still processed on a fresh store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCursor {
    /// Last fully committed block.
    pub last_block: Option<u64>,

    /// Number of blocks committed.
    pub blocks_processed: u64,

    /// Number of contract events dispatched across all committed blocks.
    pub events_processed: u64,

    /// Time of the last commit.
    pub updated_at: Option<DateTime<Utc>>,
}

impl LedgerCursor {
    /// Creates a cursor that has not processed any block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_block: None,
            blocks_processed: 0,
            events_processed: 0,
            updated_at: None,
        }
    }

    /// Creates a cursor positioned after `block`.
    #[must_use]
    pub const fn at_block(block: u64) -> Self {
        Self {
            last_block: Some(block),
            blocks_processed: 0,
            events_processed: 0,
            updated_at: None,
        }
    }

    /// Returns true if the given block has been committed.
    #[must_use]
    pub fn is_processed(&self, block: u64) -> bool {
        self.last_block.is_some_and(|last| block <= last)
    }

    /// Returns true if the given block still needs processing.
    #[must_use]
    pub fn should_process(&self, block: u64) -> bool {
        !self.is_processed(block)
    }

    /// Returns the cursor that results from committing `block`.
    ///
    /// The position never moves backwards; advancing to an already
    /// processed block returns an unchanged copy.
    #[must_use]
    pub fn advanced(&self, block: u64, events: u64) -> Self {
        if self.is_processed(block) {
            return self.clone();
        }
        Self {
            last_block: Some(block),
            blocks_processed: self.blocks_processed.saturating_add(1),
            events_processed: self.events_processed.saturating_add(events),
            updated_at: Some(Utc::now()),
        }
    }

    /// Returns the next block number to process.
    #[must_use]
    pub fn next_block(&self) -> u64 {
        self.last_block.map_or(0, |b| b.saturating_add(1))
    }
}
