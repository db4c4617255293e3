//! Gateway configuration.
//!
//! Loaded from a YAML file, then overridden by CLI flags and environment
//! variables for the listener and logging settings.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wallet_mcp::{protocol::ServerIdentity, ConnectorConfig, Wallet};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream session settings (timeouts, outbound proxy)
    #[serde(default)]
    pub upstream: ConnectorConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub wallets: WalletsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Answer POSTs with JSON even when the client accepts SSE
    #[serde(default)]
    pub json_response: bool,

    /// Keep-alive interval for the GET event stream (seconds)
    #[serde(default = "default_keep_alive_secs")]
    pub sse_keep_alive_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sse_keep_alive(&self) -> Duration {
        Duration::from_secs(self.sse_keep_alive_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            json_response: false,
            sse_keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_keep_alive_secs() -> u64 {
    15
}

/// Identity advertised to MCP clients in the `initialize` result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_server_version")]
    pub server_version: String,
}

impl ProtocolConfig {
    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity {
            name: self.server_name.clone(),
            version: self.server_version.clone(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            server_version: default_server_version(),
        }
    }
}

fn default_server_name() -> String {
    ServerIdentity::default().name
}

fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WalletsConfig {
    /// Serve the most recently created wallet when a request names none.
    /// Any caller can then reach that wallet's tools.
    #[serde(default)]
    pub allow_latest_fallback: bool,

    #[serde(default)]
    pub entries: Vec<Wallet>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatewayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: GatewayConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be non-zero".to_string(),
            ));
        }
        if self.upstream.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "upstream.connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.upstream.discovery_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "upstream.discovery_timeout_secs must be non-zero or null".to_string(),
            ));
        }
        if self.upstream.call_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "upstream.call_timeout_secs must be non-zero or null".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for wallet in &self.wallets.entries {
            wallet.validate().map_err(ConfigError::Invalid)?;
            if !seen.insert(wallet.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate wallet id '{}'",
                    wallet.id
                )));
            }
        }

        Ok(())
    }
}
