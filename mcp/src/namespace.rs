//! Namespaced tool names: `server.tool`.
//!
//! The separator is the first `.`; everything after it belongs to the tool
//! name, so upstream tools whose names contain dots still decode to the right
//! server as long as the server name itself has none.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};

pub const SEPARATOR: char = '.';

/// Unique tool identifier within a wallet: `server_name.tool_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedToolName {
    pub server_name: String,
    pub tool_name: String,
}

impl NamespacedToolName {
    pub fn new(server_name: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            tool_name: tool_name.into(),
        }
    }

    /// Parse from "server.tool" format, splitting on the first dot.
    pub fn decode(namespaced: &str) -> McpResult<Self> {
        let (server, tool) = namespaced
            .split_once(SEPARATOR)
            .ok_or_else(|| McpError::InvalidNamespace(namespaced.to_string()))?;
        Ok(Self::new(server, tool))
    }
}

impl fmt::Display for NamespacedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.server_name, SEPARATOR, self.tool_name)
    }
}

impl FromStr for NamespacedToolName {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

pub fn encode(server_name: &str, tool_name: &str) -> McpResult<String> {
    if server_name.is_empty() {
        return Err(McpError::InvalidNamespace(format!(
            "empty server name for tool '{}'",
            tool_name
        )));
    }
    Ok(NamespacedToolName::new(server_name, tool_name).to_string())
}

pub fn decode(namespaced: &str) -> McpResult<(String, String)> {
    let name = NamespacedToolName::decode(namespaced)?;
    Ok((name.server_name, name.tool_name))
}
