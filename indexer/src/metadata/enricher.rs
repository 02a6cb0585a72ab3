//! Metadata document parsing and image URL composition.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{MetadataSource, DEFAULT_IMAGE_BASE_URL, FALLBACK_IMAGE_URL};
use crate::entities::EventMetadata;

/// Outcome of one enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    /// Metadata to store on the event.
    pub metadata: EventMetadata,
    /// True if the document could not be fetched or parsed.
    pub degraded: bool,
}

/// Turns a content identifier into [`EventMetadata`], never failing.
#[derive(Clone)]
pub struct MetadataEnricher {
    source: Arc<dyn MetadataSource>,
    image_base_url: String,
}

impl std::fmt::Debug for MetadataEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataEnricher")
            .field("image_base_url", &self.image_base_url)
            .finish_non_exhaustive()
    }
}

impl MetadataEnricher {
    /// Creates an enricher with the default image base URL.
    #[must_use]
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
        }
    }

    /// Sets the base used to compose image URLs.
    #[must_use]
    pub fn with_image_base_url(mut self, base: impl Into<String>) -> Self {
        self.image_base_url = base.into();
        self
    }

    /// Fetches and parses the document for `cid`.
    ///
    /// Any failure yields empty text fields and the fallback image.
    pub async fn enrich(&self, cid: &str) -> Enrichment {
        let body = match self.source.fetch(cid).await {
            Ok(body) => body,
            Err(e) => {
                warn!(cid, error = %e, "metadata fetch failed, using fallback");
                return Self::fallback();
            }
        };

        match self.parse(cid, &body) {
            Some(metadata) => Enrichment {
                metadata,
                degraded: false,
            },
            None => {
                warn!(cid, "metadata document is not a JSON object, using fallback");
                Self::fallback()
            }
        }
    }

    /// Parses a document; returns `None` unless it is a JSON object.
    #[must_use]
    pub fn parse(&self, cid: &str, body: &[u8]) -> Option<EventMetadata> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let object = value.as_object()?;
        let text = |field: &str| object.get(field).and_then(Value::as_str).map(str::to_owned);

        let image_url = match text("image") {
            Some(path) => format!("{}{}{}", self.image_base_url, cid, path),
            None => FALLBACK_IMAGE_URL.to_string(),
        };

        Some(EventMetadata {
            name: text("name"),
            description: text("description"),
            link: text("link"),
            image_url: Some(image_url),
        })
    }

    fn fallback() -> Enrichment {
        Enrichment {
            metadata: EventMetadata {
                image_url: Some(FALLBACK_IMAGE_URL.to_string()),
                ..Default::default()
            },
            degraded: true,
        }
    }
}
