//! Diagnostics listing of a wallet's aggregated tools.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use wallet_mcp::{EndpointStatusMap, ToolDescriptor};

use super::{mcp_endpoint::WalletQuery, AppState};
use crate::wallet::{resolve_wallet, WalletLookup};

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub success: bool,
    pub data: DiagnosticsData,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsData {
    pub tools: Vec<ToolDescriptor>,
    pub endpoint_status: EndpointStatusMap,
    pub total_tools: usize,
    pub connected_servers: usize,
    pub total_servers: usize,
}

pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<WalletQuery>,
) -> Json<DiagnosticsResponse> {
    diagnostics(&state, None, query).await
}

pub async fn list_tools_with_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<WalletQuery>,
) -> Json<DiagnosticsResponse> {
    diagnostics(&state, Some(token), query).await
}

async fn diagnostics(
    state: &AppState,
    token: Option<String>,
    query: WalletQuery,
) -> Json<DiagnosticsResponse> {
    let lookup = WalletLookup {
        token,
        query_wallet_id: query.wallet_id,
        body_wallet_id: None,
    };

    let data = match resolve_wallet(
        state.resolver.as_ref(),
        &lookup,
        state.settings.allow_latest_fallback,
    )
    .await
    {
        Some(wallet) => {
            let discovery = state.router.dispatcher().list_all_tools(&wallet).await;
            DiagnosticsData {
                total_tools: discovery.total_tools(),
                connected_servers: discovery.connected_servers(),
                total_servers: wallet.servers.len(),
                tools: discovery.tools,
                endpoint_status: discovery.status,
            }
        }
        None => DiagnosticsData::default(),
    };

    Json(DiagnosticsResponse {
        success: true,
        data,
    })
}
