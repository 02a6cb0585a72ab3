//! HTTP gateway metadata source.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{FetchError, MetadataSource, METADATA_FILE};

/// Default gateway for metadata documents.
pub const DEFAULT_GATEWAY_URL: &str = "https://ipfs.io/ipfs";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Largest metadata document accepted, in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 64 * 1024;

/// Gateway client configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL; documents live at `{base_url}/{cid}/data.json`.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Maximum number of retries for retryable failures.
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each attempt.
    pub initial_backoff: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(200),
            user_agent: format!("rsvp-indexer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or not HTTP(S).
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.base_url.is_empty() {
            return Err(FetchError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(FetchError::InvalidConfig(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }
}

/// Fetches metadata documents from an IPFS HTTP gateway.
#[derive(Debug, Clone)]
pub struct IpfsGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl IpfsGateway {
    /// Creates a gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, FetchError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { config, http })
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the URL of the metadata document for `cid`.
    #[must_use]
    pub fn document_url(&self, cid: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            cid,
            METADATA_FILE
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e)
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(len) = resp.content_length() {
            if len > MAX_DOCUMENT_BYTES as u64 {
                return Err(FetchError::TooLarge(MAX_DOCUMENT_BYTES));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if body.len() + chunk.len() > MAX_DOCUMENT_BYTES {
                return Err(FetchError::TooLarge(MAX_DOCUMENT_BYTES));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl MetadataSource for IpfsGateway {
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.document_url(cid);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(url = %url, attempt, error = %e, "retrying metadata fetch");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
