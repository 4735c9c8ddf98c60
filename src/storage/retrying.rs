//! Retrying store wrapper.
//!
//! Routes every call of the wrapped store through a [`CallExecutor`], so
//! transient failures are absorbed up to the attempt budget.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{RemoteStore, Result, Row};
use crate::utils::retry::CallExecutor;

/// Store wrapper that retries transient failures with exponential backoff.
pub struct RetryingStore {
    inner: Arc<dyn RemoteStore>,
    executor: CallExecutor,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn RemoteStore>, executor: CallExecutor) -> Self {
        Self { inner, executor }
    }
}

#[async_trait]
impl RemoteStore for RetryingStore {
    #[tracing::instrument(name = "store.read_table", skip_all, fields(%table))]
    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        self.executor
            .execute("read_table", || self.inner.read_table(table))
            .await
    }

    #[tracing::instrument(name = "store.append_row", skip_all, fields(%table))]
    async fn append_row(&self, table: &str, values: Vec<Value>) -> Result<()> {
        self.executor
            .execute("append_row", || self.inner.append_row(table, values.clone()))
            .await
    }
}
