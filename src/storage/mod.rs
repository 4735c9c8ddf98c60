//! Remote table storage.
//!
//! The store is a key-less tabular document holding two named tables
//! (inventory and orders). Everything above this module sees it only
//! through [`RemoteStore`]: read a whole table as row maps, or append one
//! ordered row.
//!
//! Adapters classify their transport failures into [`StoreError::Transient`]
//! or [`StoreError::Permanent`] before returning, so retry policy never has
//! to inspect error text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::{inventory, orders};
use crate::utils::retry::CallExecutor;

pub mod cached;
pub mod mock;
pub mod retrying;
#[cfg(feature = "sheets")]
pub mod sheets;

pub use cached::CachedStore;
pub use mock::MockStore;
pub use retrying::RetryingStore;
#[cfg(feature = "sheets")]
pub use sheets::{SheetsStore, StoreConnection};

/// One table row keyed by header name.
pub type Row = serde_json::Map<String, Value>;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors at the remote-store boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Expected to resolve on retry (rate limiting, momentary server fault).
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// Will not resolve by retrying (bad credentials, missing table, malformed request).
    #[error("Permanent store failure: {0}")]
    Permanent(String),

    /// The overall call deadline elapsed while still retrying.
    #[error("Store call exceeded its deadline after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },
}

impl StoreError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Narrow accessor for the remote document's tables.
///
/// # Implementations
///
/// - `SheetsStore`: Google Sheets v4 values API
/// - `MockStore`: in-memory tables with scripted failures
/// - `RetryingStore`: wraps another store with the retrying call executor
/// - `CachedStore`: read-through TTL cache over another store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every data row of a table, keyed by the header row.
    async fn read_table(&self, table: &str) -> Result<Vec<Row>>;

    /// Append one row. Values are written in the given column order.
    async fn append_row(&self, table: &str, values: Vec<Value>) -> Result<()>;
}

/// Convert a grid (header row first) into row maps.
///
/// Short rows are padded with empty strings; rows with no non-empty cell are
/// dropped. Header cells are trimmed.
pub fn rows_from_grid(grid: Vec<Vec<Value>>) -> Vec<Row> {
    let mut lines = grid.into_iter();
    let headers: Vec<String> = match lines.next() {
        Some(header) => header.iter().map(header_text).collect(),
        None => return Vec::new(),
    };

    lines
        .filter(|cells| cells.iter().any(|c| !is_blank(c)))
        .map(|cells| {
            let mut cells = cells.into_iter();
            headers
                .iter()
                .map(|h| (h.clone(), cells.next().unwrap_or_else(|| Value::String(String::new()))))
                .collect()
        })
        .collect()
}

fn header_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Build the process-wide store stack from configuration.
///
/// The returned store is `CachedStore<RetryingStore<backend>>`: reads are
/// memoized per table, and every call that reaches the backend goes through
/// the retrying executor. The backend connection is established here, once.
pub async fn init_store(
    config: &Config,
) -> std::result::Result<Arc<CachedStore>, Box<dyn std::error::Error + Send + Sync>> {
    let executor = CallExecutor::new(config.retry.to_retry_config());

    let backend: Arc<dyn RemoteStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Storage: in-memory tables");
            let store = MockStore::new();
            store
                .create_table(&config.store.inventory_table, &inventory::columns::ALL)
                .await;
            store
                .create_table(&config.store.orders_table, &orders::ORDER_COLUMNS)
                .await;
            Arc::new(store)
        }
        #[cfg(feature = "sheets")]
        StoreBackend::Sheets => {
            info!(document = %config.store.document_id, "Storage: Google Sheets");
            let connection = StoreConnection::connect(&config.store, &executor).await?;
            Arc::new(SheetsStore::new(Arc::new(connection)))
        }
        #[cfg(not(feature = "sheets"))]
        StoreBackend::Sheets => {
            tracing::error!("Sheets storage requested but 'sheets' feature is not enabled");
            return Err("Sheets feature not enabled".into());
        }
    };

    let retrying: Arc<dyn RemoteStore> = Arc::new(RetryingStore::new(backend, executor));

    Ok(Arc::new(CachedStore::new(
        retrying,
        Duration::from_secs(config.cache.ttl_secs),
    )))
}
