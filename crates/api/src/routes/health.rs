//! Liveness endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/health", get(health_check))
}

async fn root() -> &'static str {
    "API is running"
}

/// GET /ping: answers with the id of the running instance.
async fn ping(State(state): State<AppState>) -> String {
    format!("Pong! Server ID: {}", state.server_id)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "icvk-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
