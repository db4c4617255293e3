use axum::{
    extract::State,
    http::{Method, Uri},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use wallet_mcp::MetricsSnapshot;

use super::{error, AppState};

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "OK",
        "message": "MCP Wallet server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.router.dispatcher().metrics().snapshot())
}

pub async fn not_found(method: Method, uri: Uri) -> Response {
    error::route_not_found(&method, &uri)
}
