//! Remote store, retry and cache configuration types.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

/// Default Google Sheets v4 API endpoint.
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Which backend serves the tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-memory tables (local development, demos).
    #[default]
    Memory,
    /// Google Sheets document.
    Sheets,
}

/// Remote store configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend type.
    pub backend: StoreBackend,
    /// Spreadsheet document identifier.
    pub document_id: String,
    /// OAuth bearer token for the document.
    pub access_token: Option<String>,
    /// File holding the bearer token (read once at connect).
    pub access_token_file: Option<String>,
    /// API endpoint base URL.
    pub api_base: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Name of the inventory table.
    pub inventory_table: String,
    /// Name of the orders table.
    pub orders_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            document_id: String::new(),
            access_token: None,
            access_token_file: None,
            api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            request_timeout_secs: 30,
            inventory_table: "Inventory".to_string(),
            orders_table: "Orders".to_string(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("document_id", &self.document_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_file", &self.access_token_file)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("inventory_table", &self.inventory_table)
            .field("orders_table", &self.orders_table)
            .finish()
    }
}

/// Retry settings as they appear in configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Add random jitter to each delay.
    pub jitter: bool,
    /// Overall bound per call in seconds (0 = unbounded).
    pub deadline_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 500,
            max_delay_ms: 16_000,
            jitter: false,
            deadline_secs: 60,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts.max(1),
            jitter: self.jitter,
            deadline: (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs)),
        }
    }
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a fetched table is served without re-reading, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}
