//! HTTP surface of the gateway.
//!
//! | route | methods |
//! |---|---|
//! | `/api/mcp`, `/api/mcp/s/{token}/mcp` | POST, GET, DELETE |
//! | `/api/mcp/tools`, `/api/mcp/s/{token}/tools` | GET |
//! | `/api/mcp/metrics` | GET |
//! | `/api/health` | GET |

pub mod error;
pub mod health;
pub mod mcp_endpoint;
pub mod tools;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;
use wallet_mcp::{
    protocol::ProtocolRouter, RmcpUpstreamClient, UpstreamProtocolClient, WalletDispatcher,
};

pub use error::GatewayError;

use crate::{
    config::GatewayConfig,
    wallet::{InMemoryWalletStore, WalletResolver},
};

/// Per-request HTTP behaviour.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub allow_latest_fallback: bool,
    pub json_response: bool,
    pub sse_keep_alive: Duration,
    pub max_body_bytes: usize,
}

impl HttpSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            allow_latest_fallback: config.wallets.allow_latest_fallback,
            json_response: config.server.json_response,
            sse_keep_alive: config.server.sse_keep_alive(),
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProtocolRouter>,
    pub resolver: Arc<dyn WalletResolver>,
    pub settings: Arc<HttpSettings>,
}

impl AppState {
    /// Wire the engine to a wallet store. The store also receives usage
    /// notifications for its wallets' owners.
    pub fn from_config(
        config: &GatewayConfig,
        client: Arc<dyn UpstreamProtocolClient>,
        store: Arc<InMemoryWalletStore>,
    ) -> Self {
        let dispatcher = WalletDispatcher::new(client)
            .with_usage_recorder(store.clone())
            .with_discovery_timeout(config.upstream.discovery_timeout())
            .with_call_timeout(config.upstream.call_timeout());

        let router =
            ProtocolRouter::new(Arc::new(dispatcher)).with_identity(config.protocol.identity());

        Self {
            router: Arc::new(router),
            resolver: store,
            settings: Arc::new(HttpSettings::from_config(config)),
        }
    }
}

fn mcp_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            error::HEADER_MCP_PROTOCOL_VERSION,
            HeaderName::from_static("mcp-session-id"),
        ])
        .expose_headers([error::HEADER_MCP_PROTOCOL_VERSION])
        .max_age(Duration::from_secs(86400))
}

pub fn build_app(state: AppState) -> Router {
    let max_body_bytes = state.settings.max_body_bytes;

    let mcp_routes = Router::new()
        .route(
            "/api/mcp",
            get(mcp_endpoint::get_mcp)
                .post(mcp_endpoint::post_mcp)
                .delete(mcp_endpoint::delete_mcp),
        )
        .route(
            "/api/mcp/s/{token}/mcp",
            get(mcp_endpoint::get_mcp_with_token)
                .post(mcp_endpoint::post_mcp_with_token)
                .delete(mcp_endpoint::delete_mcp),
        )
        .layer(middleware::map_response(error::with_protocol_version));

    let diagnostics_routes = Router::new()
        .route("/api/mcp/tools", get(tools::list_tools))
        .route("/api/mcp/s/{token}/tools", get(tools::list_tools_with_token))
        .route("/api/mcp/metrics", get(health::metrics));

    Router::new()
        .merge(mcp_routes)
        .merge(diagnostics_routes)
        .layer(mcp_cors())
        .route("/api/health", get(health::health))
        .fallback(health::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the gateway until Ctrl-C or SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), GatewayError> {
    let store = Arc::new(InMemoryWalletStore::new(config.wallets.entries.clone()));
    let client = Arc::new(RmcpUpstreamClient::new(config.upstream.clone().with_env_proxy()));
    let state = AppState::from_config(&config, client, Arc::clone(&store));
    let app = build_app(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(
        addr = %addr,
        wallets = store.len(),
        allow_latest_fallback = config.wallets.allow_latest_fallback,
        "MCP wallet gateway listening"
    );
    if config.wallets.allow_latest_fallback {
        info!("Requests without a wallet will be served the most recent wallet");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(GatewayError::Serve)?;

    info!("MCP wallet gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
