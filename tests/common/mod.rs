//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use mcp_wallet::{build_app, config::GatewayConfig, wallet::InMemoryWalletStore, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use wallet_mcp::{
    core::{CallToolResult, Content, JsonObject, Tool},
    McpError, McpResult, UpstreamConnection, UpstreamProtocolClient, UpstreamServer, Wallet,
};

/// Upstream double keyed by server name. Unknown names refuse connections.
#[derive(Default)]
pub struct FakeUpstreams {
    tools: HashMap<String, Vec<String>>,
    failing_calls: HashMap<String, String>,
    pub opens: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<Mutex<Vec<(String, String, Value)>>>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeUpstreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, name: &str, tools: &[&str]) -> Self {
        self.tools.insert(
            name.to_string(),
            tools.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_failing_calls(mut self, name: &str, message: &str) -> Self {
        self.tools.insert(name.to_string(), vec!["broken".to_string()]);
        self.failing_calls
            .insert(name.to_string(), message.to_string());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opens.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamProtocolClient for FakeUpstreams {
    async fn open(&self, server: &UpstreamServer) -> McpResult<Box<dyn UpstreamConnection>> {
        self.opens.lock().unwrap().push(server.name.clone());
        let tools = self.tools.get(&server.name).ok_or_else(|| {
            McpError::ConnectionFailed(format!("connect to {}: connection refused", server.url))
        })?;
        Ok(Box::new(FakeConnection {
            server_name: server.name.clone(),
            tools: tools.clone(),
            call_error: self.failing_calls.get(&server.name).cloned(),
            calls: Arc::clone(&self.calls),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct FakeConnection {
    server_name: String,
    tools: Vec<String>,
    call_error: Option<String>,
    calls: Arc<Mutex<Vec<(String, String, Value)>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl UpstreamConnection for FakeConnection {
    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        Ok(self
            .tools
            .iter()
            .map(|name| {
                let schema = json!({"type": "object", "properties": {"q": {"type": "string"}}});
                Tool::new(
                    name.clone(),
                    format!("{} tool", name),
                    Arc::new(schema.as_object().cloned().unwrap()),
                )
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> McpResult<Value> {
        let args = Value::Object(arguments.unwrap_or_default());
        self.calls.lock().unwrap().push((
            self.server_name.clone(),
            tool_name.to_string(),
            args.clone(),
        ));
        if let Some(message) = &self.call_error {
            return Err(McpError::upstream(message.clone()));
        }
        let result = CallToolResult::success(vec![Content::text(format!(
            "{} answered {} with {}",
            self.server_name, tool_name, args
        ))]);
        serde_json::to_value(result).map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn close(self: Box<Self>) -> McpResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn hr_legal_wallet() -> Wallet {
    Wallet::new(
        "wallet-1",
        vec![
            UpstreamServer::new("hr", "https://hr.example/mcp").with_api_key("hr-key"),
            UpstreamServer::new("legal", "https://legal.example/mcp"),
        ],
    )
    .with_owner("user-1")
    .with_created_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
}

pub struct TestApp {
    pub app: Router,
    pub upstreams: Arc<FakeUpstreams>,
    pub store: Arc<InMemoryWalletStore>,
}

pub fn test_app(
    upstreams: FakeUpstreams,
    wallets: Vec<Wallet>,
    config: GatewayConfig,
) -> TestApp {
    let upstreams = Arc::new(upstreams);
    let store = Arc::new(InMemoryWalletStore::new(wallets));
    let state = AppState::from_config(&config, upstreams.clone(), Arc::clone(&store));
    TestApp {
        app: build_app(state),
        upstreams,
        store,
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();
    (status, headers, body)
}

pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

/// Give spawned background tasks (session close, usage notification) a
/// chance to run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
