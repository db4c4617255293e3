//! Upstream sessions.
//!
//! `UpstreamProtocolClient` is the seam between the dispatcher and the wire:
//! it opens one session to one upstream server. The dispatcher only ever holds
//! sessions through `ScopedConnection`, which closes them on every exit path.

use std::{borrow::Cow, sync::Arc};

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, ClientInfo},
    service::RunningService,
    RoleClient,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    config::{ConnectorConfig, JsonObject, Tool, UpstreamServer, UpstreamTransport},
    metrics::McpMetrics,
    proxy::build_http_client,
};
use crate::error::{McpError, McpResult};

/// Opens transport sessions to upstream servers.
#[async_trait]
pub trait UpstreamProtocolClient: Send + Sync {
    /// Establish a session, attaching `Authorization: Bearer <apiKey>` when the
    /// server carries a key.
    async fn open(&self, server: &UpstreamServer) -> McpResult<Box<dyn UpstreamConnection>>;
}

/// One live session to an upstream server.
#[async_trait]
pub trait UpstreamConnection: Send + Sync {
    /// List every tool, following pagination to the end.
    async fn list_tools(&self) -> McpResult<Vec<Tool>>;

    /// Invoke a tool and return the upstream's result object as received.
    async fn call_tool(&self, tool_name: &str, arguments: Option<JsonObject>) -> McpResult<Value>;

    async fn close(self: Box<Self>) -> McpResult<()>;
}

/// A session that is released when the scope ends.
///
/// Call [`ScopedConnection::close`] on normal paths. If the value is dropped
/// instead (cancellation, timeout, panic unwinding) the close is spawned on the
/// current runtime.
pub struct ScopedConnection {
    server_name: String,
    inner: Option<Box<dyn UpstreamConnection>>,
    metrics: Arc<McpMetrics>,
}

impl ScopedConnection {
    pub async fn open(
        client: &dyn UpstreamProtocolClient,
        server: &UpstreamServer,
        metrics: Arc<McpMetrics>,
    ) -> McpResult<Self> {
        match client.open(server).await {
            Ok(conn) => {
                metrics.record_connection_opened();
                debug!(server = %server.name, "Opened upstream session");
                Ok(Self {
                    server_name: server.name.clone(),
                    inner: Some(conn),
                    metrics,
                })
            }
            Err(e) => {
                metrics.record_connection_error();
                Err(e)
            }
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    fn connection(&self) -> McpResult<&dyn UpstreamConnection> {
        self.inner
            .as_deref()
            .ok_or_else(|| McpError::ConnectionClosed(self.server_name.clone()))
    }

    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        self.connection()?.list_tools().await
    }

    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> McpResult<Value> {
        self.connection()?.call_tool(tool_name, arguments).await
    }

    pub async fn close(mut self) {
        if let Some(conn) = self.inner.take() {
            release(self.server_name.clone(), conn, Arc::clone(&self.metrics)).await;
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        let Some(conn) = self.inner.take() else {
            return;
        };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let server_name = std::mem::take(&mut self.server_name);
            let metrics = Arc::clone(&self.metrics);
            handle.spawn(release(server_name, conn, metrics));
        } else {
            warn!(
                server = %self.server_name,
                "No tokio runtime available for upstream session cleanup"
            );
            self.metrics.record_connection_closed();
        }
    }
}

async fn release(server_name: String, conn: Box<dyn UpstreamConnection>, metrics: Arc<McpMetrics>) {
    if let Err(e) = conn.close().await {
        warn!(server = %server_name, error = %e, "Error closing upstream session");
    }
    metrics.record_connection_closed();
    debug!(server = %server_name, "Closed upstream session");
}

/// `UpstreamProtocolClient` over the rmcp SDK.
///
/// URLs ending in `/sse` use the legacy SSE transport, everything else the
/// streamable HTTP transport.
pub struct RmcpUpstreamClient {
    config: ConnectorConfig,
}

impl RmcpUpstreamClient {
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }
}

impl Default for RmcpUpstreamClient {
    fn default() -> Self {
        Self::new(ConnectorConfig::default())
    }
}

/// Identity presented to an upstream during the handshake.
pub fn client_info_for(server_name: &str) -> ClientInfo {
    let mut client_info = ClientInfo::default();
    client_info.client_info.name = format!("mcp-wallet-{}", server_name);
    client_info.client_info.version = env!("CARGO_PKG_VERSION").to_string();
    client_info
}

#[async_trait]
impl UpstreamProtocolClient for RmcpUpstreamClient {
    async fn open(&self, server: &UpstreamServer) -> McpResult<Box<dyn UpstreamConnection>> {
        use rmcp::{
            transport::{
                sse_client::SseClientConfig,
                streamable_http_client::StreamableHttpClientTransportConfig, SseClientTransport,
                StreamableHttpClientTransport,
            },
            ServiceExt,
        };

        server.validate().map_err(McpError::Config)?;

        let http_client = build_http_client(
            self.config.connect_timeout(),
            self.config.proxy.as_ref(),
            server.api_key.as_deref(),
        )?;
        let handler = client_info_for(&server.name);

        let service = match server.transport() {
            UpstreamTransport::Sse => {
                let sse_config = SseClientConfig {
                    sse_endpoint: server.url.clone().into(),
                    ..Default::default()
                };

                let transport = SseClientTransport::start_with_client(http_client, sse_config)
                    .await
                    .map_err(|e| {
                        McpError::ConnectionFailed(format!(
                            "open SSE transport to '{}': {}",
                            server.name, e
                        ))
                    })?;

                handler.serve(transport).await.map_err(|e| {
                    McpError::ConnectionFailed(format!(
                        "initialize SSE client for '{}': {}",
                        server.name, e
                    ))
                })?
            }
            UpstreamTransport::Streamable => {
                let cfg = StreamableHttpClientTransportConfig::with_uri(server.url.as_str());
                let transport = StreamableHttpClientTransport::with_client(http_client, cfg);

                handler.serve(transport).await.map_err(|e| {
                    McpError::ConnectionFailed(format!(
                        "initialize streamable client for '{}': {}",
                        server.name, e
                    ))
                })?
            }
        };

        Ok(Box::new(RmcpConnection { service }))
    }
}

struct RmcpConnection {
    service: RunningService<RoleClient, ClientInfo>,
}

#[async_trait]
impl UpstreamConnection for RmcpConnection {
    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        self.service
            .peer()
            .list_all_tools()
            .await
            .map_err(McpError::from)
    }

    // The rmcp transport decodes results into its typed model, so members
    // outside the MCP result schema do not survive this path.
    async fn call_tool(&self, tool_name: &str, arguments: Option<JsonObject>) -> McpResult<Value> {
        let request = CallToolRequestParam {
            name: Cow::Owned(tool_name.to_string()),
            arguments,
        };

        let result = self
            .service
            .peer()
            .call_tool(request)
            .await
            .map_err(McpError::from)?;

        serde_json::to_value(&result)
            .map_err(|e| McpError::Transport(format!("encode tool result: {}", e)))
    }

    async fn close(self: Box<Self>) -> McpResult<()> {
        self.service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| McpError::Transport(format!("close session: {}", e)))
    }
}
