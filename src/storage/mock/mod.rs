//! Mock storage implementation for testing.
//!
//! Tables live in memory as a header row plus data rows. Failures can be
//! scripted per call so retry and cache behaviour can be exercised without
//! a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use super::{rows_from_grid, RemoteStore, Result, Row, StoreError};

#[derive(Debug, Clone, Default)]
struct MockTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Mock store that keeps tables in memory.
#[derive(Default)]
pub struct MockStore {
    tables: RwLock<HashMap<String, MockTable>>,
    failures: Mutex<VecDeque<StoreError>>,
    read_calls: AtomicUsize,
    append_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table with the given header row.
    pub async fn create_table(&self, table: &str, headers: &[&str]) {
        self.tables.write().await.insert(
            table.to_string(),
            MockTable {
                headers: headers.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Replace a table's contents.
    pub async fn put_rows(&self, table: &str, headers: &[&str], rows: Vec<Vec<Value>>) {
        self.tables.write().await.insert(
            table.to_string(),
            MockTable {
                headers: headers.iter().map(|h| h.to_string()).collect(),
                rows,
            },
        );
    }

    /// Fail the next call (read or append) with `error`. Queued failures are
    /// consumed in order.
    pub async fn push_failure(&self, error: StoreError) {
        self.failures.lock().await.push_back(error);
    }

    /// Fail the next `count` calls with clones of `error`.
    pub async fn fail_next(&self, count: usize, error: StoreError) {
        let mut failures = self.failures.lock().await;
        for _ in 0..count {
            failures.push_back(error.clone());
        }
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    /// Rows appended to (or seeded into) a table, without the header.
    pub async fn stored_rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Calls to `read_table`, including failed ones.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Calls to `append_row`, including failed ones.
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    async fn scripted_failure(&self) -> Result<()> {
        match self.failures.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::Permanent(format!("table '{}' not found", table))
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure().await?;

        let tables = self.tables.read().await;
        let stored = tables.get(table).ok_or_else(|| missing_table(table))?;

        let mut grid = Vec::with_capacity(stored.rows.len() + 1);
        grid.push(
            stored
                .headers
                .iter()
                .map(|h| Value::String(h.clone()))
                .collect(),
        );
        grid.extend(stored.rows.iter().cloned());
        Ok(rows_from_grid(grid))
    }

    async fn append_row(&self, table: &str, values: Vec<Value>) -> Result<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure().await?;

        let mut tables = self.tables.write().await;
        let stored = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        stored.rows.push(values);
        Ok(())
    }
}
