//! Block processing for the RSVP indexer.
//!
//! This module turns ordered blocks of raw logs into committed entity
//! writes, one atomic commit per block.
//!
//! # Components
//!
//! - [`types`]: Block, HandlerOutcome, DropReason, BlockResult types
//! - [`cursor`]: LedgerCursor for tracking processing progress
//! - [`processor`]: BlockProcessor implementation
//! - [`metrics`]: Processor metrics

pub mod cursor;
pub mod metrics;
pub mod processor;
pub mod types;

pub use cursor::LedgerCursor;
pub use metrics::{IndexerMetrics, MetricsSnapshot};
pub use processor::BlockProcessor;
pub use types::{Block, BlockResult, DropReason, DroppedEvent, HandlerOutcome};
