//! RSVP Indexer - Block-ordered indexer for Web3 RSVP contract events.
//!
//! This crate consumes the logs emitted by an event-RSVP contract, in block
//! and log order, and maintains a queryable store of events, accounts, RSVPs
//! and confirmed attendances. Processing is idempotent: every handler uses
//! deterministic IDs and create-if-absent semantics, and each block is
//! committed atomically together with the ledger cursor.
//!
//! # Components
//!
//! - [`entities`]: Identifiers and stored entity types
//! - [`decoder`]: Raw log decoding into contract events
//! - [`store`]: Entity store trait, write batch, memory and SQLite backends
//! - [`handlers`]: Per-event handlers
//! - [`metadata`]: Best-effort event metadata enrichment
//! - [`events`]: Block processor, ledger cursor and metrics
//! - [`source`]: JSON-lines block source
//! - [`config`]: Indexer configuration
//! - [`error`]: Error types

pub mod config;
pub mod decoder;
pub mod entities;
pub mod error;
pub mod events;
pub mod handlers;
pub mod metadata;
pub mod source;
pub mod store;

pub use config::{ConfigError, IndexerConfig};
pub use decoder::{ContractEvent, DecodeError, LogDecoder, RawLog};
pub use entities::{Account, Address, Confirmation, Event, EventId, Rsvp};
pub use error::{IndexerError, IndexerResult};
pub use events::{Block, BlockProcessor, BlockResult, DropReason, HandlerOutcome, LedgerCursor};
pub use source::{read_blocks, SourceError};
pub use store::{EntityStore, MemoryStore, SqliteStore, StoreError};
