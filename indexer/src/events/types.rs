//! Types for the block processor.
//!
//! Defines blocks, handler outcomes and per-block processing results.

use serde::{Deserialize, Serialize};

use crate::decoder::RawLog;

/// Reason a contract event left the store unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// `NewEventCreated` for an ID that already exists.
    DuplicateEvent,
    /// RSVP for a pair that already has one.
    DuplicateRsvp,
    /// Confirmation for a pair that already has one.
    DuplicateConfirmation,
    /// Event ID was never created.
    UnknownEvent,
}

impl DropReason {
    /// Returns a human-readable name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateEvent => "duplicate_event",
            Self::DuplicateRsvp => "duplicate_rsvp",
            Self::DuplicateConfirmation => "duplicate_confirmation",
            Self::UnknownEvent => "unknown_event",
        }
    }

    /// Returns true for drops caused by replayed or duplicated input.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEvent | Self::DuplicateRsvp | Self::DuplicateConfirmation
        )
    }
}

/// Result of running one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerOutcome {
    /// The event changed the store.
    Applied,
    /// The event was absorbed without a core state change.
    Dropped(DropReason),
}

impl HandlerOutcome {
    /// Returns true if the event was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns the drop reason, if dropped.
    #[must_use]
    pub const fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Self::Applied => None,
            Self::Dropped(reason) => Some(*reason),
        }
    }
}

/// All logs of one block, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block number.
    pub number: u64,
    /// Logs of the block.
    pub logs: Vec<RawLog>,
}

impl Block {
    /// Creates a block.
    #[must_use]
    pub fn new(number: u64, logs: Vec<RawLog>) -> Self {
        Self { number, logs }
    }
}

/// A dropped event together with its log position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedEvent {
    /// Log index within the block.
    pub log_index: u32,
    /// Why it was dropped.
    pub reason: DropReason,
}

/// Result of processing one block.
#[derive(Debug, Clone, Default)]
pub struct BlockResult {
    /// Block number.
    pub block_number: u64,
    /// True if the block was already committed and nothing ran.
    pub already_processed: bool,
    /// Number of contract events dispatched to handlers.
    pub events_processed: usize,
    /// Number of events that changed the store.
    pub applied: usize,
    /// Events that were absorbed, with reasons.
    pub dropped: Vec<DroppedEvent>,
    /// Logs from other contracts or with unrelated topics.
    pub ignored: usize,
    /// Logs of known topics that failed to decode.
    pub decode_errors: usize,
    /// Number of entity writes committed.
    pub writes: usize,
}

impl BlockResult {
    /// Creates an empty result for `block_number`.
    #[must_use]
    pub fn empty(block_number: u64) -> Self {
        Self {
            block_number,
            ..Default::default()
        }
    }

    /// Creates the result of skipping an already committed block.
    #[must_use]
    pub fn skipped(block_number: u64) -> Self {
        Self {
            block_number,
            already_processed: true,
            ..Default::default()
        }
    }

    /// Records a handler outcome for the log at `log_index`.
    pub fn record(&mut self, log_index: u32, outcome: HandlerOutcome) {
        self.events_processed += 1;
        match outcome {
            HandlerOutcome::Applied => self.applied += 1,
            HandlerOutcome::Dropped(reason) => {
                self.dropped.push(DroppedEvent { log_index, reason });
            }
        }
    }

    /// Returns the number of drops with the given reason.
    #[must_use]
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }

    /// Returns true if no events were dispatched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events_processed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_as_str() {
        assert_eq!(DropReason::DuplicateEvent.as_str(), "duplicate_event");
        assert_eq!(DropReason::DuplicateRsvp.as_str(), "duplicate_rsvp");
        assert_eq!(
            DropReason::DuplicateConfirmation.as_str(),
            "duplicate_confirmation"
        );
        assert_eq!(DropReason::UnknownEvent.as_str(), "unknown_event");
    }

    #[test]
    fn test_drop_reason_is_duplicate() {
        assert!(DropReason::DuplicateEvent.is_duplicate());
        assert!(DropReason::DuplicateRsvp.is_duplicate());
        assert!(!DropReason::UnknownEvent.is_duplicate());
    }

    #[test]
    fn test_handler_outcome() {
        assert!(HandlerOutcome::Applied.is_applied());
        assert_eq!(HandlerOutcome::Applied.drop_reason(), None);

        let dropped = HandlerOutcome::Dropped(DropReason::UnknownEvent);
        assert!(!dropped.is_applied());
        assert_eq!(dropped.drop_reason(), Some(DropReason::UnknownEvent));
    }

    #[test]
    fn test_block_result_record() {
        let mut result = BlockResult::empty(9);
        assert!(result.is_empty());

        result.record(0, HandlerOutcome::Applied);
        result.record(1, HandlerOutcome::Dropped(DropReason::UnknownEvent));
        result.record(2, HandlerOutcome::Dropped(DropReason::UnknownEvent));

        assert_eq!(result.events_processed, 3);
        assert_eq!(result.applied, 1);
        assert_eq!(result.dropped_for(DropReason::UnknownEvent), 2);
        assert_eq!(result.dropped_for(DropReason::DuplicateRsvp), 0);
        assert_eq!(result.dropped[1].log_index, 2);
    }

    #[test]
    fn test_block_result_skipped() {
        let result = BlockResult::skipped(4);
        assert!(result.already_processed);
        assert!(result.is_empty());
        assert_eq!(result.block_number, 4);
    }
}
