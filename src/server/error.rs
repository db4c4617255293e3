use axum::{
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use wallet_mcp::protocol::{JsonRpcError, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION};

use crate::config::ConfigError;

pub const HEADER_MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteNotFound<'a> {
    success: bool,
    message: &'static str,
    requested_url: String,
    method: &'a str,
}

/// 404 body for any path outside the routing table.
pub fn route_not_found(method: &Method, uri: &Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(RouteNotFound {
            success: false,
            message: "Route not found",
            requested_url: uri.to_string(),
            method: method.as_str(),
        }),
    )
        .into_response()
}

/// A JSON-RPC error answered outside the normal 200 flow.
pub fn jsonrpc_error(status: StatusCode, error: JsonRpcError) -> Response {
    (
        status,
        Json(JsonRpcResponse::failure(serde_json::Value::Null, error)),
    )
        .into_response()
}

pub fn parse_error(detail: impl Into<String>) -> Response {
    jsonrpc_error(StatusCode::BAD_REQUEST, JsonRpcError::parse_error(detail))
}

pub fn invalid_request(detail: impl Into<String>) -> Response {
    jsonrpc_error(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request(detail))
}

pub fn not_acceptable(detail: impl Into<String>) -> Response {
    jsonrpc_error(
        StatusCode::NOT_ACCEPTABLE,
        JsonRpcError::invalid_request(detail),
    )
}

pub fn method_not_allowed(detail: impl Into<String>) -> Response {
    jsonrpc_error(
        StatusCode::METHOD_NOT_ALLOWED,
        JsonRpcError::invalid_request(detail),
    )
}

/// Stamp the negotiated protocol revision on every MCP response.
pub async fn with_protocol_version(mut response: Response) -> Response {
    response.headers_mut().insert(
        HEADER_MCP_PROTOCOL_VERSION,
        HeaderValue::from_static(DEFAULT_PROTOCOL_VERSION),
    );
    response
}
