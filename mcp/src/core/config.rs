//! Wallet and upstream configuration types.
//!
//! Defines the wallet model consumed by the dispatcher, per-upstream
//! descriptors, connector timeouts and the outbound proxy settings.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
pub use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde::{Deserialize, Serialize};

use crate::namespace::SEPARATOR;

/// A named aggregation unit owning zero or more upstream servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,

    /// Account whose usage counter is bumped on successful tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Upstream servers, in discovery order
    #[serde(default)]
    pub servers: Vec<UpstreamServer>,
}

impl Wallet {
    pub fn new(id: impl Into<String>, servers: Vec<UpstreamServer>) -> Self {
        Self {
            id: id.into(),
            owner: None,
            created_at: Utc::now(),
            servers,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Find a server by exact name.
    pub fn server(&self, name: &str) -> Option<&UpstreamServer> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Check structural invariants: unique, non-empty, dot-free server names
    /// and http(s) URLs.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("wallet id must not be empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            server
                .validate()
                .map_err(|e| format!("wallet '{}': {}", self.id, e))?;
            if !seen.insert(server.name.as_str()) {
                return Err(format!(
                    "wallet '{}': duplicate server name '{}'",
                    self.id, server.name
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamServer {
    pub name: String,
    pub url: String,

    /// Bearer token for Authorization header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl UpstreamServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Legacy SSE endpoints are recognised by their `/sse` path suffix.
    pub fn transport(&self) -> UpstreamTransport {
        if self.url.trim_end_matches('/').ends_with("/sse") {
            UpstreamTransport::Sse
        } else {
            UpstreamTransport::Streamable
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("server name must not be empty".to_string());
        }
        if self.name.contains(SEPARATOR) {
            return Err(format!(
                "server name '{}' must not contain '{}'",
                self.name, SEPARATOR
            ));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| format!("server '{}' has invalid url: {}", self.name, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!(
                "server '{}' has unsupported url scheme '{}'",
                self.name,
                parsed.scheme()
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for UpstreamServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamServer")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTransport {
    Streamable,
    Sse,
}

/// Timeouts and proxy settings for upstream sessions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    /// TCP connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Bound on one upstream's open+list+close during discovery (seconds).
    /// `null` waits for the slowest upstream.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: Option<u64>,

    /// Bound on a single tool call (seconds). `null` means unbounded.
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,

    /// Outbound proxy for upstream traffic
    #[serde(default)]
    pub proxy: Option<McpProxyConfig>,
}

impl ConnectorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_secs.map(Duration::from_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }

    /// Merge with environment-based proxy config
    pub fn with_env_proxy(mut self) -> Self {
        if self.proxy.is_none() {
            self.proxy = McpProxyConfig::from_env();
        }
        self
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            discovery_timeout_secs: default_discovery_timeout(),
            call_timeout_secs: None,
            proxy: None,
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_discovery_timeout() -> Option<u64> {
    Some(30)
}

/// Proxy configuration for upstream MCP traffic only
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct McpProxyConfig {
    /// HTTP proxy URL (e.g., "http://proxy.internal:8080")
    pub http: Option<String>,

    /// HTTPS proxy URL
    pub https: Option<String>,

    /// Comma-separated hosts to exclude from proxying
    /// Example: "localhost,127.0.0.1,*.internal,10.*"
    pub no_proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for McpProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpProxyConfig")
            .field("http", &self.http)
            .field("https", &self.https)
            .field("no_proxy", &self.no_proxy)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

impl McpProxyConfig {
    /// Load proxy config from standard environment variables
    pub fn from_env() -> Option<Self> {
        let http = std::env::var("MCP_HTTP_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTP_PROXY").ok());

        let https = std::env::var("MCP_HTTPS_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTPS_PROXY").ok());

        let no_proxy = std::env::var("MCP_NO_PROXY")
            .ok()
            .or_else(|| std::env::var("NO_PROXY").ok());

        if http.is_some() || https.is_some() {
            Some(Self {
                http,
                https,
                no_proxy,
                username: None,
                password: None,
            })
        } else {
            None
        }
    }
}
