//! Indexer error types.
//!
//! Aggregates the per-module errors for callers that drive the whole
//! pipeline.

use crate::config::ConfigError;
use crate::decoder::DecodeError;
use crate::metadata::FetchError;
use crate::source::SourceError;
use crate::store::StoreError;

/// Indexer errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Block source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Log could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Entity store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Metadata gateway could not be set up.
    #[error("metadata error: {0}")]
    Metadata(#[from] FetchError),
}

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;
