//! Read-through table cache.
//!
//! `read_table` results are memoized per table name for a fixed TTL. Within
//! the window, repeated reads return the stored rows without contacting the
//! wrapped store. Appends always go to the wrapped store; a successful append
//! drops the cached copy of that table. Failed refreshes are never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{RemoteStore, Result, Row};

struct CachedTable {
    rows: Vec<Row>,
    fetched_at: Instant,
}

/// Read-through TTL cache over a [`RemoteStore`].
pub struct CachedStore {
    inner: Arc<dyn RemoteStore>,
    ttl: Duration,
    tables: RwLock<HashMap<String, CachedTable>>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn RemoteStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Drop the cached copy of `table`, regardless of remaining TTL.
    pub async fn invalidate(&self, table: &str) {
        if self.tables.write().await.remove(table).is_some() {
            info!(%table, "Table cache invalidated");
        }
    }

    /// Invalidate and fetch `table` again.
    pub async fn reload(&self, table: &str) -> Result<Vec<Row>> {
        self.invalidate(table).await;
        self.read_table(table).await
    }

    /// Age of the cached copy of `table`, if any.
    pub async fn cached_age(&self, table: &str) -> Option<Duration> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.fetched_at.elapsed())
    }

    async fn fresh(&self, table: &str) -> Option<Vec<Row>> {
        let tables = self.tables.read().await;
        let cached = tables.get(table)?;
        (cached.fetched_at.elapsed() < self.ttl).then(|| cached.rows.clone())
    }
}

#[async_trait]
impl RemoteStore for CachedStore {
    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        if let Some(rows) = self.fresh(table).await {
            debug!(%table, rows = rows.len(), "Table cache hit");
            return Ok(rows);
        }

        let rows = self.inner.read_table(table).await?;
        info!(%table, rows = rows.len(), ttl_secs = self.ttl.as_secs(), "Table cache refreshed");

        self.tables.write().await.insert(
            table.to_string(),
            CachedTable {
                rows: rows.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(rows)
    }

    async fn append_row(&self, table: &str, values: Vec<Value>) -> Result<()> {
        self.inner.append_row(table, values).await?;
        self.tables.write().await.remove(table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::{MockStore, StoreError};

    const TTL: Duration = Duration::from_secs(120);

    async fn setup() -> (Arc<MockStore>, CachedStore) {
        let mock = Arc::new(MockStore::new());
        mock.put_rows(
            "Inventory",
            &["ItemName", "Price"],
            vec![vec![json!("A"), json!(100)]],
        )
        .await;
        mock.create_table("Orders", &["Name"]).await;
        let cache = CachedStore::new(mock.clone(), TTL);
        (mock, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_within_ttl_hit_cache() {
        let (mock, cache) = setup().await;

        let first = cache.read_table("Inventory").await.unwrap();
        tokio::time::advance(Duration::from_secs(119)).await;
        let second = cache.read_table("Inventory").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.read_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let (mock, cache) = setup().await;

        cache.read_table("Inventory").await.unwrap();
        mock.put_rows(
            "Inventory",
            &["ItemName", "Price"],
            vec![vec![json!("A"), json!(100)], vec![json!("B"), json!(200)]],
        )
        .await;

        tokio::time::advance(TTL).await;
        let rows = cache.read_table("Inventory").await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(mock.read_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_bypasses_remaining_ttl() {
        let (mock, cache) = setup().await;

        cache.read_table("Inventory").await.unwrap();
        mock.put_rows("Inventory", &["ItemName", "Price"], vec![])
            .await;

        let rows = cache.reload("Inventory").await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(mock.read_calls(), 2);
        assert_eq!(cache.cached_age("Inventory").await, Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_is_surfaced_and_not_cached() {
        let (mock, cache) = setup().await;
        mock.push_failure(StoreError::Permanent("403".to_string()))
            .await;

        let err = cache.read_table("Inventory").await.unwrap_err();
        assert_eq!(err, StoreError::Permanent("403".to_string()));
        assert!(cache.cached_age("Inventory").await.is_none());

        let rows = cache.read_table("Inventory").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tables_are_cached_independently() {
        let (mock, cache) = setup().await;

        cache.read_table("Inventory").await.unwrap();
        cache.read_table("Orders").await.unwrap();
        cache.read_table("Inventory").await.unwrap();
        cache.invalidate("Orders").await;
        cache.read_table("Inventory").await.unwrap();

        assert_eq!(mock.read_calls(), 2);
        assert!(cache.cached_age("Orders").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_appends_are_never_cached() {
        let (mock, cache) = setup().await;

        cache.read_table("Orders").await.unwrap();
        cache.append_row("Orders", vec![json!("Budi")]).await.unwrap();
        cache.append_row("Orders", vec![json!("Sari")]).await.unwrap();

        assert_eq!(mock.append_calls(), 2);
        assert_eq!(mock.stored_rows("Orders").await.len(), 2);

        let orders = cache.read_table("Orders").await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(mock.read_calls(), 2);
    }
}
