//! liveorder-server: order page API
//!
//! Serves the catalog view and order submission over HTTP, backed by the
//! configured remote store (Google Sheets or in-memory tables).
//!
//! ## Architecture
//! ```text
//! [Browser] -> [REST API :8080] -> [CachedStore] -> [RetryingStore] -> [Sheets]
//! ```
//!
//! ## Configuration
//! - LIVEORDER_CONFIG: YAML config file path (default: ./config.yaml if present)
//! - LIVEORDER__STORE__BACKEND: "sheets" or "memory" (default: memory)
//! - LIVEORDER__SERVER__PORT: REST API port (default: 8080)
//! - LIVEORDER_LOG: tracing filter (default: info)

use std::sync::Arc;

use tracing::info;

use liveorder::config::Config;
use liveorder::handlers::rest::{serve, AppState};
use liveorder::storage::init_store;
use liveorder::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = Config::load(None)?;
    info!(
        backend = ?config.store.backend,
        address = %config.server.bind_address(),
        "starting liveorder-server"
    );

    let store = init_store(&config).await?;
    let state = Arc::new(AppState::new(store, &config)?);

    serve(state, &config.server).await
}
