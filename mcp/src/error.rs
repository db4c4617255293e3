//! MCP error types.
//!
//! Defines error variants for wallet operations: namespace decoding, upstream
//! connection and execution failures, and configuration errors.

use serde_json::Value;
use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Tool name must be namespaced (e.g., \"server.toolname\"): {0}")]
    InvalidNamespace(String),

    #[error("Server '{0}' not found")]
    ServerNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection already closed: {0}")]
    ConnectionClosed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure reported by the upstream server itself.
    #[error("{message}")]
    Upstream {
        message: String,
        data: Option<Value>,
    },

    #[error("Upstream '{server}' timed out after {seconds}s")]
    Timeout { server: String, seconds: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl McpError {
    pub fn upstream(message: impl Into<String>) -> Self {
        McpError::Upstream {
            message: message.into(),
            data: None,
        }
    }

    /// Errors the caller caused; these never reach an upstream.
    pub fn is_invalid_params(&self) -> bool {
        matches!(
            self,
            McpError::InvalidNamespace(_) | McpError::ServerNotFound(_)
        )
    }
}

impl From<rmcp::service::ServiceError> for McpError {
    fn from(err: rmcp::service::ServiceError) -> Self {
        match err {
            rmcp::service::ServiceError::McpError(data) => McpError::Upstream {
                message: data.message.to_string(),
                data: data.data,
            },
            other => McpError::upstream(other.to_string()),
        }
    }
}
