//! HTTP host adapter.
//!
//! Lets a browser host (extension background worker or native-messaging
//! bridge) drive the pipeline over local HTTP instead of in-process message
//! passing.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/messages/savedata` | Run one save; replies `{"message"}` or `{"error"}` |
//! | `POST` | `/messages/reconcile` | Prune closed tabs; replies with the report |
//! | `PUT`  | `/tabs` | Replace the open-tab list used for reconciliation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Save replies always use status 200: success or failure is carried in the
//! body, matching the message-passing contract the host expects.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so extension pages can
//! call the adapter directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::dispatch::{handle_save, Dispatcher, SaveResponse};
use crate::reconcile::try_reconcile;
use crate::store::Store;
use crate::tabs::{OpenTab, StaticTabs};

/// Shared state handed to every route.
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    tabs: Arc<StaticTabs>,
}

/// Starts the adapter on `[server].bind` using the configured SQLite store.
///
/// Reconciliation uses the tab list pushed via `PUT /tabs`; until the host
/// pushes one, reconciliation fails and nothing is pruned.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(db::open_store(config).await?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "host adapter listening");
    serve(listener, config, store).await
}

/// Serves the adapter on an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    config: &Config,
    store: Arc<dyn Store>,
) -> anyhow::Result<()> {
    let tabs = Arc::new(StaticTabs::default());
    let dispatcher = Dispatcher::from_config(config, store, tabs.clone())?;
    let app = router(AppState {
        dispatcher: Arc::new(dispatcher),
        tabs,
    });
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/messages/savedata", post(handle_savedata))
        .route("/messages/reconcile", post(handle_reconcile))
        .route("/tabs", put(handle_put_tabs))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

async fn handle_savedata(State(state): State<AppState>) -> Json<SaveResponse> {
    tracing::debug!("savedata message received");
    Json(handle_save(&state.dispatcher).await)
}

async fn handle_reconcile(State(state): State<AppState>) -> Response {
    let store = state.dispatcher.store().as_ref();
    match try_reconcile(store, state.dispatcher.tabs().as_ref()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:#}", e) })),
        )
            .into_response(),
    }
}

async fn handle_put_tabs(
    State(state): State<AppState>,
    Json(tabs): Json<Vec<OpenTab>>,
) -> StatusCode {
    tracing::debug!(tabs = tabs.len(), "open tabs updated");
    state.tabs.replace(tabs).await;
    StatusCode::NO_CONTENT
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
