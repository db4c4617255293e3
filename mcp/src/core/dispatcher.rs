//! Wallet aggregation and dispatch.
//!
//! Discovery fans out to every upstream of a wallet concurrently and merges
//! the results under namespaced names; one failing upstream never hides the
//! others. Invocation decodes the namespaced name and talks to exactly one
//! upstream. Each operation opens fresh sessions and releases them before
//! returning.

use std::{future::Future, ops::Index, sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{
    config::{ConnectorConfig, JsonObject, Tool, UpstreamServer, Wallet},
    connector::{RmcpUpstreamClient, ScopedConnection, UpstreamProtocolClient},
    metrics::McpMetrics,
};
use crate::{
    error::{McpError, McpResult},
    namespace::{self, NamespacedToolName},
};

/// A tool as presented to wallet clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// `server.tool`
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    /// Namespace an upstream tool under its server.
    pub fn from_upstream(server_name: &str, tool: Tool) -> McpResult<Self> {
        let description = tool
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("No description");

        let input_schema = if tool.input_schema.is_empty() {
            Arc::new(empty_object_schema())
        } else {
            tool.input_schema
        };

        Ok(Self {
            name: namespace::encode(server_name, &tool.name)?,
            description: format!("[{}] {}", server_name, description),
            input_schema,
        })
    }
}

fn empty_object_schema() -> JsonObject {
    match json!({"type": "object", "properties": {}, "required": []}) {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Outcome of one upstream during discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatus {
    pub connected: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointStatus {
    pub fn connected(tools_count: usize) -> Self {
        Self {
            connected: true,
            tools_count: Some(tools_count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            tools_count: None,
            error: Some(error.into()),
        }
    }
}

/// Per-server status in wallet order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointStatusMap(Vec<(String, EndpointStatus)>);

impl EndpointStatusMap {
    /// Record a server's outcome, replacing any earlier entry in place.
    pub fn insert(&mut self, server_name: String, status: EndpointStatus) {
        match self.0.iter_mut().find(|(name, _)| *name == server_name) {
            Some((_, existing)) => *existing = status,
            None => self.0.push((server_name, status)),
        }
    }

    pub fn get(&self, server_name: &str) -> Option<&EndpointStatus> {
        self.0
            .iter()
            .find(|(name, _)| name == server_name)
            .map(|(_, status)| status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointStatus)> {
        self.0.iter().map(|(name, status)| (name.as_str(), status))
    }

    pub fn values(&self) -> impl Iterator<Item = &EndpointStatus> {
        self.0.iter().map(|(_, status)| status)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for EndpointStatusMap {
    type Output = EndpointStatus;

    fn index(&self, server_name: &str) -> &EndpointStatus {
        match self.get(server_name) {
            Some(status) => status,
            None => panic!("no endpoint status for server '{}'", server_name),
        }
    }
}

impl Serialize for EndpointStatusMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Merged catalogue plus per-upstream status, built fresh on every call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub tools: Vec<ToolDescriptor>,
    pub status: EndpointStatusMap,
}

impl Discovery {
    pub fn total_tools(&self) -> usize {
        self.tools.len()
    }

    pub fn connected_servers(&self) -> usize {
        self.status.values().filter(|s| s.connected).count()
    }
}

/// Receives a notification for every successful tool call.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record_tool_call(
        &self,
        owner: &str,
        wallet_id: &str,
        tool: &NamespacedToolName,
    ) -> McpResult<()>;
}

pub struct NoopUsageRecorder;

#[async_trait]
impl UsageRecorder for NoopUsageRecorder {
    async fn record_tool_call(
        &self,
        _owner: &str,
        _wallet_id: &str,
        _tool: &NamespacedToolName,
    ) -> McpResult<()> {
        Ok(())
    }
}

/// Aggregation dispatcher for wallets.
pub struct WalletDispatcher {
    client: Arc<dyn UpstreamProtocolClient>,
    usage: Arc<dyn UsageRecorder>,
    metrics: Arc<McpMetrics>,
    discovery_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
}

impl WalletDispatcher {
    pub fn new(client: Arc<dyn UpstreamProtocolClient>) -> Self {
        let defaults = ConnectorConfig::default();
        Self {
            client,
            usage: Arc::new(NoopUsageRecorder),
            metrics: Arc::new(McpMetrics::new()),
            discovery_timeout: defaults.discovery_timeout(),
            call_timeout: defaults.call_timeout(),
        }
    }

    /// Dispatcher backed by real rmcp sessions.
    pub fn from_config(config: ConnectorConfig) -> Self {
        let discovery_timeout = config.discovery_timeout();
        let call_timeout = config.call_timeout();
        Self::new(Arc::new(RmcpUpstreamClient::new(config)))
            .with_discovery_timeout(discovery_timeout)
            .with_call_timeout(call_timeout)
    }

    #[must_use]
    pub fn with_usage_recorder(mut self, usage: Arc<dyn UsageRecorder>) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<McpMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn metrics(&self) -> &Arc<McpMetrics> {
        &self.metrics
    }

    /// Discover every tool of every upstream in the wallet.
    ///
    /// Never fails: an unreachable or misbehaving upstream shows up as a
    /// disconnected entry in `status` and contributes no tools.
    pub async fn list_all_tools(&self, wallet: &Wallet) -> Discovery {
        let results = join_all(wallet.servers.iter().map(|s| self.discover_server(s))).await;

        let mut discovery = Discovery::default();
        let mut failures = 0;

        for (server, result) in wallet.servers.iter().zip(results) {
            match result {
                Ok(tools) => {
                    debug!(server = %server.name, count = tools.len(), "Discovered tools");
                    discovery
                        .status
                        .insert(server.name.clone(), EndpointStatus::connected(tools.len()));
                    discovery.tools.extend(tools);
                }
                Err(e) => {
                    warn!(
                        wallet = %wallet.id,
                        server = %server.name,
                        error = %e,
                        "Failed to discover tools"
                    );
                    failures += 1;
                    discovery
                        .status
                        .insert(server.name.clone(), EndpointStatus::failed(e.to_string()));
                }
            }
        }

        self.metrics.record_discovery(failures);
        info!(
            wallet = %wallet.id,
            tools = discovery.total_tools(),
            connected = discovery.connected_servers(),
            total = wallet.servers.len(),
            "Wallet discovery complete"
        );

        discovery
    }

    async fn discover_server(&self, server: &UpstreamServer) -> McpResult<Vec<ToolDescriptor>> {
        let (conn, listed) = bounded(
            &server.name,
            self.discovery_timeout,
            self.open_and(server, |conn| async move {
                let listed = conn.list_tools().await;
                (conn, listed)
            }),
        )
        .await?;
        conn.close().await;

        listed?
            .into_iter()
            .map(|tool| ToolDescriptor::from_upstream(&server.name, tool))
            .collect()
    }

    /// Open a session and run `op` on it, handing the session back so the
    /// caller can close it outside any deadline. Dropping the returned future
    /// early releases the session in the background.
    async fn open_and<F, Fut, T>(
        &self,
        server: &UpstreamServer,
        op: F,
    ) -> McpResult<(ScopedConnection, T)>
    where
        F: FnOnce(ScopedConnection) -> Fut,
        Fut: Future<Output = (ScopedConnection, T)>,
    {
        let conn =
            ScopedConnection::open(self.client.as_ref(), server, Arc::clone(&self.metrics))
                .await?;
        Ok(op(conn).await)
    }

    /// Invoke `server.tool` on the one upstream that owns it.
    ///
    /// Name and server errors are returned before any session is opened.
    /// Upstream errors come back unchanged and are never retried.
    pub async fn call_namespaced_tool(
        &self,
        wallet: &Wallet,
        namespaced_name: &str,
        arguments: Option<JsonObject>,
    ) -> McpResult<Value> {
        let name = match NamespacedToolName::decode(namespaced_name) {
            Ok(name) => name,
            Err(e) => {
                self.metrics.record_call_rejected();
                return Err(e);
            }
        };

        let Some(server) = wallet.server(&name.server_name) else {
            self.metrics.record_call_rejected();
            return Err(McpError::ServerNotFound(name.server_name));
        };

        self.metrics.record_call_start();
        let start = Instant::now();

        let tool_name = name.tool_name.as_str();
        let attempt = self.open_and(server, |conn| async move {
            let result = conn.call_tool(&tool_name, arguments).await;
            (conn, result)
        });
        let result = match bounded(&server.name, self.call_timeout, attempt).await {
            Ok((conn, result)) => {
                conn.close().await;
                result
            }
            Err(e) => Err(e),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        self.metrics
            .record_call_end(&server.name, result.is_ok(), duration_ms);

        match &result {
            Ok(_) => {
                info!(
                    wallet = %wallet.id,
                    tool = %name,
                    duration_ms,
                    "Tool call succeeded"
                );
                self.notify_usage(wallet, name);
            }
            Err(e) => {
                warn!(
                    wallet = %wallet.id,
                    tool = %name,
                    error = %e,
                    "Tool call failed"
                );
            }
        }

        result
    }

    fn notify_usage(&self, wallet: &Wallet, tool: NamespacedToolName) {
        let Some(owner) = wallet.owner.clone() else {
            return;
        };

        let usage = Arc::clone(&self.usage);
        let metrics = Arc::clone(&self.metrics);
        let wallet_id = wallet.id.clone();

        tokio::spawn(async move {
            if let Err(e) = usage.record_tool_call(&owner, &wallet_id, &tool).await {
                metrics.record_usage_failure();
                warn!(
                    owner = %owner,
                    wallet = %wallet_id,
                    tool = %tool,
                    error = %e,
                    "Failed to record tool usage"
                );
            }
        });
    }
}

/// Run `attempt` under an optional deadline. On expiry the attempt is
/// dropped, which releases any session it holds in the background.
async fn bounded<T>(
    server_name: &str,
    limit: Option<Duration>,
    attempt: impl Future<Output = McpResult<T>>,
) -> McpResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| McpError::Timeout {
                server: server_name.to_string(),
                seconds: limit.as_secs(),
            })?,
        None => attempt.await,
    }
}
