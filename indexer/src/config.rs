//! Indexer configuration.
//!
//! Provides configuration options for the indexer binary, loaded from the
//! environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::Address;
use crate::metadata::gateway::{DEFAULT_GATEWAY_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};
use crate::metadata::{GatewayConfig, DEFAULT_IMAGE_BASE_URL};

/// Default SQLite database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://rsvp-indexer.db";

/// Default raw log file.
pub const DEFAULT_LOGS_PATH: &str = "logs.jsonl";

/// Configuration for the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// SQLite connection URL.
    pub database_url: String,

    /// JSON-lines file of raw contract logs.
    pub logs_path: String,

    /// Contract address to filter logs by (hex). `None` accepts any address.
    pub contract_address: Option<String>,

    /// Gateway base URL for metadata documents.
    pub ipfs_gateway_url: String,

    /// Base used to compose event image URLs.
    pub image_base_url: String,

    /// Whether to fetch event metadata.
    pub metadata_enabled: bool,

    /// Metadata request timeout in milliseconds.
    pub metadata_timeout_ms: u64,

    /// Maximum retries for metadata requests.
    pub metadata_max_retries: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            logs_path: DEFAULT_LOGS_PATH.to_string(),
            contract_address: None,
            ipfs_gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            metadata_enabled: true,
            metadata_timeout_ms: DEFAULT_TIMEOUT_MS,
            metadata_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl IndexerConfig {
    /// Loads the configuration from environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(path) = env::var("LOGS_PATH") {
            config.logs_path = path;
        }
        if let Ok(address) = env::var("CONTRACT_ADDRESS") {
            if !address.trim().is_empty() {
                config.contract_address = Some(address.trim().to_string());
            }
        }
        if let Ok(url) = env::var("IPFS_GATEWAY_URL") {
            config.ipfs_gateway_url = url;
        }
        if let Ok(url) = env::var("IPFS_IMAGE_BASE_URL") {
            config.image_base_url = url;
        }
        if let Ok(value) = env::var("METADATA_ENABLED") {
            config.metadata_enabled = parse_bool("METADATA_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("METADATA_TIMEOUT_MS") {
            config.metadata_timeout_ms = parse_number("METADATA_TIMEOUT_MS", &value)?;
        }
        if let Ok(value) = env::var("METADATA_MAX_RETRIES") {
            config.metadata_max_retries = parse_number("METADATA_MAX_RETRIES", &value)?;
        }

        Ok(config)
    }

    /// Sets the database URL.
    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Sets the raw log file.
    #[must_use]
    pub fn with_logs_path(mut self, path: impl Into<String>) -> Self {
        self.logs_path = path.into();
        self
    }

    /// Sets the contract address filter.
    #[must_use]
    pub fn with_contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    /// Enables or disables metadata enrichment.
    #[must_use]
    pub fn with_metadata_enabled(mut self, enabled: bool) -> Self {
        self.metadata_enabled = enabled;
        self
    }

    /// Sets the metadata request timeout.
    #[must_use]
    pub fn with_metadata_timeout(mut self, ms: u64) -> Self {
        self.metadata_timeout_ms = ms;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidDatabaseUrl(self.database_url.clone()));
        }

        if self.logs_path.is_empty() {
            return Err(ConfigError::MissingLogsPath);
        }

        self.parse_contract_address()?;

        if self.metadata_enabled {
            if self.metadata_timeout_ms == 0 {
                return Err(ConfigError::InvalidMetadataTimeout);
            }
            self.gateway_config()
                .validate()
                .map_err(|e| ConfigError::InvalidGateway(e.to_string()))?;
        }

        Ok(())
    }

    /// Parses the contract address filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not 20 bytes of hex.
    pub fn parse_contract_address(&self) -> Result<Option<Address>, ConfigError> {
        self.contract_address
            .as_deref()
            .map(|s| {
                Address::from_str(s).map_err(|_| ConfigError::InvalidContractAddress(s.to_string()))
            })
            .transpose()
    }

    /// Builds the metadata gateway configuration.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(self.ipfs_gateway_url.clone())
            .with_timeout(Duration::from_millis(self.metadata_timeout_ms))
            .with_max_retries(self.metadata_max_retries)
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Database URL is not a SQLite URL.
    #[error("database_url must be a sqlite: URL, got {0}")]
    InvalidDatabaseUrl(String),

    /// No log file configured.
    #[error("logs_path cannot be empty")]
    MissingLogsPath,

    /// Invalid contract address.
    #[error("invalid contract address: {0}")]
    InvalidContractAddress(String),

    /// Invalid metadata timeout.
    #[error("metadata_timeout_ms must be > 0")]
    InvalidMetadataTimeout,

    /// Invalid metadata gateway.
    #[error("invalid metadata gateway: {0}")]
    InvalidGateway(String),

    /// Environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}
