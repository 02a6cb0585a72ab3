//! Entity store.
//!
//! Handlers never talk to a backend directly: they read and write through a
//! [`BlockBatch`], which is committed to an [`EntityStore`] together with the
//! advanced [`LedgerCursor`] once the whole block has been handled.
//!
//! # Components
//!
//! - [`batch`]: read-your-writes overlay for one block
//! - [`memory`]: in-process store
//! - [`sqlite`]: durable SQLite store

pub mod batch;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::entities::{Entity, EntityKey};
use crate::events::LedgerCursor;

pub use batch::BlockBatch;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Entity store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be interpreted.
    #[error("corrupt record {key}: {reason}")]
    Corrupt {
        /// Offending key.
        key: String,
        /// What was wrong.
        reason: String,
    },

    /// A counter does not fit the storage column.
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Backend holding committed entities and the ledger cursor.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Loads a committed entity.
    async fn load(&self, key: &EntityKey) -> StoreResult<Option<Entity>>;

    /// Returns the committed cursor, or a fresh one for an empty store.
    async fn cursor(&self) -> StoreResult<LedgerCursor>;

    /// Applies `writes` in order and stores `cursor`, atomically.
    async fn commit(&self, writes: Vec<Entity>, cursor: &LedgerCursor) -> StoreResult<()>;
}
