//! Streamable HTTP binding of the wallet endpoint.
//!
//! POST carries one JSON-RPC message or a batch. Answers are returned as a
//! JSON body or, when the client accepts it, as an SSE stream of `message`
//! events. GET opens a push stream that only ever carries keep-alives since
//! the router is stateless.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wallet_mcp::{
    protocol::{InboundMessage, JsonRpcResponse},
    Wallet,
};

use super::{
    error::{self, HEADER_MCP_PROTOCOL_VERSION},
    AppState,
};
use crate::wallet::{resolve_wallet, WalletLookup};

const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    #[serde(rename = "walletId")]
    pub wallet_id: Option<String>,
}

pub async fn post_mcp(
    State(state): State<AppState>,
    Query(query): Query<WalletQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_post(&state, None, query, &headers, &body).await
}

pub async fn post_mcp_with_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<WalletQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_post(&state, Some(token), query, &headers, &body).await
}

async fn handle_post(
    state: &AppState,
    token: Option<String>,
    query: WalletQuery,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return error::parse_error(e.to_string()),
    };

    let lookup = WalletLookup {
        token,
        query_wallet_id: query.wallet_id,
        body_wallet_id: payload
            .get("walletId")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    let wallet = resolve_wallet(
        state.resolver.as_ref(),
        &lookup,
        state.settings.allow_latest_fallback,
    )
    .await;

    let (messages, is_batch) = match payload {
        Value::Array(items) if items.is_empty() => {
            return error::invalid_request("empty batch");
        }
        Value::Array(items) => (items, true),
        single => (vec![single], false),
    };

    let protocol_version = headers
        .get(HEADER_MCP_PROTOCOL_VERSION)
        .and_then(|v| v.to_str().ok());

    let responses: Vec<JsonRpcResponse> = join_all(
        messages
            .into_iter()
            .map(|message| handle_message(state, wallet.as_deref(), message, protocol_version)),
    )
    .await
    .into_iter()
    .flatten()
    .collect();

    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    if accepts_event_stream(headers) && !state.settings.json_response {
        return event_stream(responses);
    }

    if is_batch {
        Json(responses).into_response()
    } else {
        match responses.into_iter().next() {
            Some(response) => Json(response).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    }
}

async fn handle_message(
    state: &AppState,
    wallet: Option<&Wallet>,
    message: Value,
    protocol_version: Option<&str>,
) -> Option<JsonRpcResponse> {
    match InboundMessage::from_value(message) {
        Ok(InboundMessage::Request(request)) => {
            state.router.handle(wallet, request, protocol_version).await
        }
        Ok(InboundMessage::ClientResponse) => {
            debug!("Ignoring client response message");
            None
        }
        Err(response) => Some(response),
    }
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(EVENT_STREAM))
}

fn event_stream(responses: Vec<JsonRpcResponse>) -> Response {
    let events: Vec<Result<Event, axum::Error>> = responses
        .iter()
        .map(|response| Event::default().event("message").json_data(response))
        .collect();
    Sse::new(tokio_stream::iter(events)).into_response()
}

/// Server-push stream. Nothing is ever pushed; the connection is held open
/// with keep-alive comments until the client goes away.
pub async fn get_mcp(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !accepts_event_stream(&headers) {
        return error::not_acceptable("Client must accept text/event-stream");
    }

    debug!("Opening server-push stream");
    let stream = futures::stream::pending::<Result<Event, Infallible>>();
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(state.settings.sse_keep_alive))
        .into_response()
}

pub async fn get_mcp_with_token(
    state: State<AppState>,
    Path(_token): Path<String>,
    headers: HeaderMap,
) -> Response {
    get_mcp(state, headers).await
}

/// There are no sessions to terminate.
pub async fn delete_mcp() -> Response {
    error::method_not_allowed("Session termination is not supported")
}
