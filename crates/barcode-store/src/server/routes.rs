//! Axum HTTP routes for the lookup API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{error, info};

use super::commands::handle_command;
use crate::config::ServerConfig;
use crate::core::LookupStore;
use crate::error::{Result, StoreError};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn LookupStore>,
    pub config: ServerConfig,
    /// Last payload remembered by `/api/receive`, served by `/api/data`.
    pub last_received: RwLock<Option<Value>>,
}

impl AppState {
    pub fn new(store: Arc<dyn LookupStore>, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            last_received: RwLock::new(None),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/receive", post(receive))
        .route("/api/data", get(last_data))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "WebServer is running.",
    }))
}

async fn receive(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) =
        body.map_err(|e| StoreError::InvalidRequest(e.body_text()))?;
    Ok(Json(handle_command(&state, body).await?))
}

async fn last_data(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.last_received.read().await.as_ref() {
        Some(data) => Json(json!({ "status": "ok", "last_stored_data": data })),
        None => Json(json!({ "message": "No data has been stored yet." })),
    }
}

/// Run the lookup API until Ctrl-C.
pub async fn serve(store: Arc<dyn LookupStore>, config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| StoreError::Config(format!("Invalid bind address: {}", e)))?;

    let state = Arc::new(AppState::new(store, config));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Lookup API listening on http://{}", addr);
    info!("  GET  /");
    info!("  POST /api/receive");
    info!("  GET  /api/data");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down gracefully..."),
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
}
