//! Stateless per-message handler for the wallet endpoint.
//!
//! Maps `initialize`, `tools/list` and `tools/call` onto the dispatcher and
//! renders every outcome as a JSON-RPC response. Notifications are accepted
//! and never answered.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::jsonrpc::{
    InboundMethod, JsonRpcError, JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION,
    JSONRPC_VERSION,
};
use crate::{
    core::{JsonObject, Wallet, WalletDispatcher},
    error::McpError,
};

/// Name and version advertised in the `initialize` result.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "MCP Wallet Proxy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
}

pub struct ProtocolRouter {
    dispatcher: Arc<WalletDispatcher>,
    identity: ServerIdentity,
}

impl ProtocolRouter {
    pub fn new(dispatcher: Arc<WalletDispatcher>) -> Self {
        Self {
            dispatcher,
            identity: ServerIdentity::default(),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn dispatcher(&self) -> &Arc<WalletDispatcher> {
        &self.dispatcher
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` for notifications. `protocol_version_header` is the
    /// value of the client's `MCP-Protocol-Version` header, if any.
    pub async fn handle(
        &self,
        wallet: Option<&Wallet>,
        request: JsonRpcRequest,
        protocol_version_header: Option<&str>,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Ignoring notification");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let Some(wallet) = wallet else {
            warn!(method = %request.method, "No wallet resolved for request");
            return Some(JsonRpcResponse::failure(id, JsonRpcError::wallet_not_found()));
        };

        let method = InboundMethod::from(request.method.as_str());
        debug!(wallet = %wallet.id, method = method.as_str(), "Handling request");

        let outcome = match method {
            InboundMethod::Initialize => {
                Ok(self.initialize_result(request.params.as_ref(), protocol_version_header))
            }
            InboundMethod::ListTools => self.list_tools(wallet).await,
            InboundMethod::CallTool => self.call_tool(wallet, request.params).await,
            InboundMethod::Unknown(_) => Err(JsonRpcError::method_not_found()),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    fn initialize_result(&self, params: Option<&Value>, header: Option<&str>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .or(header)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "logging": {},
                "tools": {"listChanged": true}
            },
            "serverInfo": {
                "name": self.identity.name,
                "version": self.identity.version
            }
        })
    }

    async fn list_tools(&self, wallet: &Wallet) -> Result<Value, JsonRpcError> {
        let discovery = self.dispatcher.list_all_tools(wallet).await;
        serde_json::to_value(&discovery.tools)
            .map(|tools| json!({ "tools": tools }))
            .map_err(|e| {
                error!(wallet = %wallet.id, error = %e, "Failed to serialize tool list");
                JsonRpcError::internal()
            })
    }

    async fn call_tool(
        &self,
        wallet: &Wallet,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?
            .unwrap_or(CallToolParams {
                name: None,
                arguments: None,
            });

        let name = params
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| JsonRpcError::invalid_params("Invalid params: tool name required"))?;

        let arguments: JsonObject = match params.arguments {
            None | Some(Value::Null) => JsonObject::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(JsonRpcError::invalid_params(
                    "Invalid params: arguments must be an object",
                ))
            }
        };

        match self
            .dispatcher
            .call_namespaced_tool(wallet, &name, Some(arguments))
            .await
        {
            Ok(result) => Ok(result),
            Err(McpError::InvalidNamespace(_)) => Err(JsonRpcError::invalid_params(
                "Tool name must be namespaced (e.g., \"server.toolname\")",
            )),
            Err(e) if e.is_invalid_params() => Err(JsonRpcError::invalid_params(e.to_string())),
            Err(e) => Err(execution_error(&name, e)),
        }
    }
}

fn execution_error(name: &str, err: McpError) -> JsonRpcError {
    let data = match err {
        McpError::Upstream {
            message,
            data: Some(data),
        } => json!({ "message": message, "data": data }),
        other => Value::String(other.to_string()),
    };

    JsonRpcError::new(
        super::jsonrpc::INTERNAL_ERROR,
        format!("Failed to execute tool '{}'", name),
    )
    .with_data(data)
}
