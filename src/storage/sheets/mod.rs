//! Google Sheets storage backend.
//!
//! Each table is one worksheet of a single spreadsheet document. Reads use
//! the values API with unformatted values so numeric cells arrive as JSON
//! numbers; appends insert one raw row after the last data row.
//!
//! Transport failures are classified here. 429 and 5xx responses and failed
//! connections are transient. Read timeouts are transient too; an append that
//! times out after the request was sent may already have landed, so it is
//! permanent. Every other failure is permanent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{rows_from_grid, RemoteStore, Result, Row, StoreError};
use crate::config::StoreConfig;
use crate::utils::retry::CallExecutor;

/// Authorized session for one spreadsheet document.
///
/// Built once per process by [`StoreConnection::connect`]: credentials are
/// resolved, the HTTP client is configured, and the document is looked up to
/// confirm both tables exist. Immutable afterwards and shared by reference.
#[derive(Debug)]
pub struct StoreConnection {
    client: Client,
    api_base: Url,
    document_id: String,
    tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl StoreConnection {
    /// Authorize and look up the document.
    pub async fn connect(config: &StoreConfig, executor: &CallExecutor) -> Result<Self> {
        let token = resolve_token(config)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| StoreError::Permanent("access token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        let api_base = Url::parse(&config.api_base)
            .map_err(|e| StoreError::Permanent(format!("invalid api_base '{}': {}", config.api_base, e)))?;

        let mut connection = Self {
            client,
            api_base,
            document_id: config.document_id.clone(),
            tables: Vec::new(),
        };

        let tables = executor
            .execute("lookup_document", || connection.fetch_sheet_titles())
            .await?;
        connection.tables = tables;

        for required in [&config.inventory_table, &config.orders_table] {
            if !connection.tables.iter().any(|t| t == required) {
                return Err(StoreError::Permanent(format!(
                    "table '{}' not found in document {}",
                    required, connection.document_id
                )));
            }
        }

        info!(
            document = %connection.document_id,
            tables = ?connection.tables,
            "Connected to spreadsheet"
        );
        Ok(connection)
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Worksheet titles found at connect time.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    fn document_url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Permanent("api_base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.document_id)
            .extend(extra);
        Ok(url)
    }

    async fn fetch_sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.document_url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let response = self.client.get(url).send().await.map_err(classify_transport)?;
        let meta: SpreadsheetMeta = decode(response).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn get_values(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let mut url = self.document_url(&["values", table])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");

        let response = self.client.get(url).send().await.map_err(classify_transport)?;
        let range: ValueRange = decode(response).await?;
        Ok(range.values)
    }

    async fn append_values(&self, table: &str, values: Vec<Value>) -> Result<()> {
        let range = format!("{}:append", table);
        let mut url = self.document_url(&["values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .client
            .post(url)
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await
            .map_err(classify_write_transport)?;
        let _: Value = decode(response).await?;
        Ok(())
    }
}

fn resolve_token(config: &StoreConfig) -> Result<String> {
    if let Some(token) = config.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }
    if let Some(path) = &config.access_token_file {
        let token = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Permanent(format!("failed to read access token file '{}': {}", path, e))
        })?;
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }
    Err(StoreError::Permanent("no access token configured".to_string()))
}

/// Map a response status to a store error class.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> StoreError {
    let detail = format!(
        "HTTP {} - {}",
        status,
        body.chars().take(200).collect::<String>()
    );
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StoreError::Transient(detail)
    } else {
        StoreError::Permanent(detail)
    }
}

fn classify_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() || err.is_connect() {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Permanent(err.to_string())
    }
}

/// Appends are not idempotent: only a request that never reached the server
/// is safe to send again.
fn classify_write_transport(err: reqwest::Error) -> StoreError {
    if err.is_connect() {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Permanent(format!("append outcome unknown: {}", err))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body);
        if err.is_transient() {
            warn!(%status, "Sheets API returned retryable status");
        }
        return Err(err);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Permanent(format!("malformed Sheets API response: {}", e)))
}

/// [`RemoteStore`] backed by a spreadsheet document.
pub struct SheetsStore {
    connection: Arc<StoreConnection>,
}

impl SheetsStore {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl RemoteStore for SheetsStore {
    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        let grid = self.connection.get_values(table).await?;
        debug!(%table, lines = grid.len(), "Fetched sheet values");
        Ok(rows_from_grid(grid))
    }

    async fn append_row(&self, table: &str, values: Vec<Value>) -> Result<()> {
        self.connection.append_values(table, values).await?;
        debug!(%table, "Appended sheet row");
        Ok(())
    }
}
