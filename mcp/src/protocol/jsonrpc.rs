//! JSON-RPC 2.0 envelopes for the wallet endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision assumed when the client names none.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// Internal faults and upstream execution failures.
pub const INTERNAL_ERROR: i64 = -32603;
pub const WALLET_NOT_FOUND: i64 = -32004;

/// Inbound request or notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,

    /// `None` marks a notification. An explicit `null` is a present id.
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,

    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, "Parse error").with_data(Value::String(detail.into()))
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request").with_data(Value::String(detail.into()))
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }

    pub fn wallet_not_found() -> Self {
        Self::new(WALLET_NOT_FOUND, "No wallet configured")
    }
}

/// Method of an inbound request, decided once per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMethod {
    Initialize,
    ListTools,
    CallTool,
    Unknown(String),
}

impl From<&str> for InboundMethod {
    fn from(method: &str) -> Self {
        match method {
            "initialize" => InboundMethod::Initialize,
            "tools/list" => InboundMethod::ListTools,
            "tools/call" => InboundMethod::CallTool,
            other => InboundMethod::Unknown(other.to_string()),
        }
    }
}

impl InboundMethod {
    pub fn as_str(&self) -> &str {
        match self {
            InboundMethod::Initialize => "initialize",
            InboundMethod::ListTools => "tools/list",
            InboundMethod::CallTool => "tools/call",
            InboundMethod::Unknown(other) => other,
        }
    }
}

/// One element of a POSTed body.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Request(JsonRpcRequest),
    /// A response sent by the client; accepted and ignored.
    ClientResponse,
}

impl InboundMessage {
    /// Classify a decoded JSON value. Malformed messages yield the error
    /// response to send back.
    pub fn from_value(value: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(ref object) = value else {
            return Err(JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::invalid_request("message must be a JSON object"),
            ));
        };

        if object.contains_key("method") {
            let id = object.get("id").cloned().unwrap_or(Value::Null);
            return serde_json::from_value::<JsonRpcRequest>(value)
                .map(InboundMessage::Request)
                .map_err(|e| {
                    JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e.to_string()))
                });
        }

        if object.contains_key("result") || object.contains_key("error") {
            return Ok(InboundMessage::ClientResponse);
        }

        let id = object.get("id").cloned().unwrap_or(Value::Null);
        Err(JsonRpcResponse::failure(
            id,
            JsonRpcError::invalid_request("missing method"),
        ))
    }
}
