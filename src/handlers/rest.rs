//! JSON API for the order page.
//!
//! Endpoints:
//! - `GET /api/health`: health check
//! - `GET /api/catalog`: derive the catalog view for a client-held view state
//! - `POST /api/inventory/reload`: drop the cached inventory and fetch it again
//! - `POST /api/orders`: submit one order
//!
//! View state lives with the client. `GET /api/catalog` takes the current
//! state as query parameters plus an optional event, and returns the next
//! state with its render.
//!
//! Submission debounce is keyed by the `x-session-id` header. Requests
//! without one are not debounced. Sessions whose debounce window has passed
//! are pruned whenever a session is looked up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::catalog::{CatalogRender, CatalogView, SortMode, ViewEvent, ViewState};
use crate::config::{Config, ConfigError, ServerConfig};
use crate::inventory::InventoryReader;
use crate::orders::{OrderDesk, OrderError, OrderForm, OrderSession, SubmitOutcome};
use crate::storage::{CachedStore, StoreError};

/// Header carrying the caller's session key for submission debounce.
pub const SESSION_HEADER: &str = "x-session-id";

const STORE_UNAVAILABLE: &str = "Inventory is unavailable right now, please try again later.";

const WAIT_NOTICE: &str = "Your order is being processed, please wait a moment.";

type SharedSession = Arc<Mutex<OrderSession>>;

/// Shared state for axum handlers.
pub struct AppState {
    desk: OrderDesk,
    debounce: Duration,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl AppState {
    pub fn new(store: Arc<CachedStore>, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            desk: OrderDesk::from_config(store, config)?,
            debounce: Duration::from_millis(config.orders.debounce_ms),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn inventory(&self) -> &InventoryReader {
        self.desk.inventory()
    }

    /// Session for `key`, or a fresh unshared one when the caller sent none.
    async fn session(&self, key: Option<&str>) -> SharedSession {
        let Some(key) = key else {
            return SharedSession::default();
        };
        let mut sessions = self.sessions.lock().await;
        prune_idle_sessions(&mut sessions, self.debounce);
        sessions.entry(key.to_string()).or_default().clone()
    }
}

/// Drop sessions that are not in use and can no longer debounce anything.
fn prune_idle_sessions(sessions: &mut HashMap<String, SharedSession>, debounce: Duration) {
    let before = sessions.len();
    sessions.retain(|_, session| {
        if Arc::strong_count(session) > 1 {
            return true;
        }
        let active = match session.try_lock() {
            Ok(session) => session
                .last_write()
                .is_some_and(|at| at.elapsed() < debounce),
            Err(_) => true,
        };
        active
    });
    let pruned = before - sessions.len();
    if pruned > 0 {
        debug!(pruned, remaining = sessions.len(), "Pruned idle order sessions");
    }
}

/// Start the REST server.
///
/// When `port` is 0, the OS assigns an ephemeral port. The actual bound
/// port is always logged so it can be discovered.
pub async fn serve(
    state: Arc<AppState>,
    server: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(server.bind_address()).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "Order API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/catalog", get(catalog))
        .route("/api/inventory/reload", post(reload_inventory))
        .route("/api/orders", post(submit_order))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Query string of `GET /api/catalog`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogQuery {
    category: Option<String>,
    q: Option<String>,
    sort: Option<SortMode>,
    page: Option<usize>,
    selected: Option<String>,
    /// One of `category`, `search`, `sort`, `prev`, `next`, `select`.
    event: Option<String>,
    /// Argument for `category`, `search`, `sort` and `select` events.
    value: Option<String>,
}

impl CatalogQuery {
    fn state(&self) -> ViewState {
        let defaults = ViewState::default();
        ViewState {
            selected_category: self
                .category
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.selected_category),
            search_query: self.q.clone().unwrap_or_default(),
            sort_mode: self.sort.unwrap_or_default(),
            current_page: self.page.unwrap_or(defaults.current_page),
            selected_item_name: self.selected.clone().filter(|s| !s.is_empty()),
        }
    }

    fn event(&self) -> Result<Option<ViewEvent>, String> {
        let Some(event) = self.event.as_deref() else {
            return Ok(None);
        };
        let value = || {
            self.value
                .clone()
                .ok_or_else(|| format!("event '{}' requires a value", event))
        };
        let parsed = match event {
            "category" => ViewEvent::SelectCategory(value()?),
            "search" => ViewEvent::Search(value()?),
            "sort" => ViewEvent::Sort(value()?.parse()?),
            "prev" => ViewEvent::PrevPage,
            "next" => ViewEvent::NextPage,
            "select" => ViewEvent::SelectItem(value()?),
            other => return Err(format!("unknown event '{}'", other)),
        };
        Ok(Some(parsed))
    }
}

#[derive(Debug, Serialize)]
struct CatalogResponse<'a> {
    state: ViewState,
    view: CatalogRender,
    /// Discount percentages the order form may offer.
    discounts: &'a [f64],
}

async fn catalog(
    State(app): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Response {
    let event = match query.event() {
        Ok(event) => event,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, reason),
    };

    let snapshot = match app.inventory().snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return store_unavailable(&e),
    };

    let view = CatalogView::new(&snapshot);
    let current = query.state();
    let state = match event {
        Some(event) => view.apply(&current, event),
        None => current,
    };
    let render = view.render(&state);

    Json(CatalogResponse {
        state,
        view: render,
        discounts: app.desk.discounts().values(),
    })
    .into_response()
}

async fn reload_inventory(State(app): State<Arc<AppState>>) -> Response {
    match app.inventory().reload().await {
        Ok(snapshot) => {
            info!(items = snapshot.len(), "Inventory reloaded on request");
            Json(json!({ "items": snapshot.len() })).into_response()
        }
        Err(e) => store_unavailable(&e),
    }
}

async fn submit_order(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<OrderForm>,
) -> Response {
    let key = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let session = app.session(key).await;
    let mut session = session.lock().await;

    match app.desk.submit(&mut session, &form).await {
        Ok(SubmitOutcome::Accepted(receipt)) => (
            StatusCode::CREATED,
            Json(json!({
                "summary": receipt.summary(),
                "receipt": receipt,
            })),
        )
            .into_response(),
        Ok(SubmitOutcome::Throttled { retry_after }) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "notice": WAIT_NOTICE,
                "retry_after_ms": retry_after.as_millis() as u64,
            })),
        )
            .into_response(),
        Err(e @ OrderError::Store(_)) => {
            error!(error = %e, "Order submission failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.user_message())
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.user_message()),
    }
}

fn store_unavailable(e: &StoreError) -> Response {
    error!(error = %e, "Failed to load inventory");
    error_response(StatusCode::SERVICE_UNAVAILABLE, STORE_UNAVAILABLE)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
