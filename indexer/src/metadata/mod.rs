//! Best-effort event metadata enrichment.
//!
//! Events carry a content identifier pointing at a small JSON document
//! (`name`, `description`, `link`, `image`). Fetching it may fail in many
//! ways; none of them may fail the handler that asked for it.
//!
//! # Components
//!
//! - [`gateway`]: HTTP gateway source with retries
//! - [`enricher`]: document parsing and image URL composition

pub mod enricher;
pub mod gateway;

use async_trait::async_trait;

pub use enricher::{Enrichment, MetadataEnricher};
pub use gateway::{GatewayConfig, IpfsGateway};

/// Name of the metadata document under an event's content identifier.
pub const METADATA_FILE: &str = "data.json";

/// Default base for composed image URLs.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://ipfs.io/ipfs/";

/// Image used when the document has no image or could not be read.
pub const FALLBACK_IMAGE_URL: &str =
    "https://ipfs.io/ipfs/bafybeibssbrlptcefbqfh4vpw2wlmqfj2kgxt3nil4yujxbmdznau3t5wi/event.png";

/// Metadata fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Gateway answered with a non-success status.
    #[error("gateway returned status {0}")]
    Status(u16),

    /// Document exceeds the size limit.
    #[error("document larger than {0} bytes")]
    TooLarge(usize),

    /// Invalid gateway configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FetchError {
    /// Returns true if retrying the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::NotFound(_) | Self::TooLarge(_) | Self::InvalidConfig(_) => false,
        }
    }
}

/// Source of raw metadata documents.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches the metadata document stored under `cid`.
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>, FetchError>;
}
