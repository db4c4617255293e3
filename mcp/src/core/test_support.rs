//! In-process upstream double for engine tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use rmcp::model::Content;
use serde_json::{json, Value};

use super::{
    config::{CallToolResult, JsonObject, Tool, UpstreamServer},
    connector::{UpstreamConnection, UpstreamProtocolClient},
};
use crate::error::{McpError, McpResult};

#[derive(Clone)]
enum Behavior {
    Healthy {
        tools: Vec<Tool>,
        list_delay: Option<Duration>,
        close_delay: Option<Duration>,
        call_result: Option<Value>,
        call_error: Option<(String, Option<Value>)>,
    },
    Unreachable,
    ListFails(String),
}

#[derive(Default)]
struct Recorder {
    opens: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, String, Option<JsonObject>)>>,
    closes: AtomicUsize,
}

#[derive(Default)]
pub(crate) struct FakeUpstreamClient {
    servers: HashMap<String, Behavior>,
    recorder: Arc<Recorder>,
}

pub(crate) fn tool(name: &str, description: Option<&str>) -> Tool {
    let schema = json!({
        "type": "object",
        "properties": {"q": {"type": "string"}},
    });
    let mut tool = Tool::new(
        name.to_string(),
        String::new(),
        Arc::new(schema.as_object().cloned().unwrap_or_default()),
    );
    tool.description = description.map(|d| d.to_string().into());
    tool
}

impl FakeUpstreamClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_server(self, name: &str, tool_names: Vec<&str>) -> Self {
        let tools = tool_names
            .into_iter()
            .map(|t| tool(t, Some(&format!("{} tool", t))))
            .collect();
        self.with_tools(name, tools)
    }

    pub(crate) fn with_tools(mut self, name: &str, tools: Vec<Tool>) -> Self {
        self.servers.insert(
            name.to_string(),
            Behavior::Healthy {
                tools,
                list_delay: None,
                close_delay: None,
                call_result: None,
                call_error: None,
            },
        );
        self
    }

    pub(crate) fn with_slow_server(mut self, name: &str, delay: Duration) -> Self {
        self.servers.insert(
            name.to_string(),
            Behavior::Healthy {
                tools: vec![tool("slow", None)],
                list_delay: Some(delay),
                close_delay: None,
                call_result: None,
                call_error: None,
            },
        );
        self
    }

    pub(crate) fn with_failing_calls(
        mut self,
        name: &str,
        message: &str,
        data: Option<Value>,
    ) -> Self {
        self.servers.insert(
            name.to_string(),
            Behavior::Healthy {
                tools: vec![tool("broken", None)],
                list_delay: None,
                close_delay: None,
                call_result: None,
                call_error: Some((message.to_string(), data)),
            },
        );
        self
    }

    /// Healthy server whose session takes `delay` to shut down.
    pub(crate) fn with_slow_close(
        self,
        name: &str,
        tool_names: Vec<&str>,
        delay: Duration,
    ) -> Self {
        let mut client = self.with_server(name, tool_names);
        if let Some(Behavior::Healthy { close_delay, .. }) = client.servers.get_mut(name) {
            *close_delay = Some(delay);
        }
        client
    }

    /// Healthy server answering every call with `result` as-is.
    pub(crate) fn with_call_result(self, name: &str, result: Value) -> Self {
        let mut client = self.with_server(name, vec!["report"]);
        if let Some(Behavior::Healthy { call_result, .. }) = client.servers.get_mut(name) {
            *call_result = Some(result);
        }
        client
    }

    pub(crate) fn with_unreachable_server(mut self, name: &str) -> Self {
        self.servers.insert(name.to_string(), Behavior::Unreachable);
        self
    }

    pub(crate) fn with_list_failure(mut self, name: &str, message: &str) -> Self {
        self.servers
            .insert(name.to_string(), Behavior::ListFails(message.to_string()));
        self
    }

    pub(crate) fn opens(&self) -> Vec<String> {
        self.recorder.opens.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<(String, String, Option<JsonObject>)> {
        self.recorder.calls.lock().unwrap().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamProtocolClient for FakeUpstreamClient {
    async fn open(&self, server: &UpstreamServer) -> McpResult<Box<dyn UpstreamConnection>> {
        self.recorder.opens.lock().unwrap().push(server.name.clone());
        match self.servers.get(&server.name) {
            None | Some(Behavior::Unreachable) => Err(McpError::ConnectionFailed(format!(
                "connect to '{}': connection refused",
                server.name
            ))),
            Some(behavior) => Ok(Box::new(FakeConnection {
                server_name: server.name.clone(),
                behavior: behavior.clone(),
                recorder: Arc::clone(&self.recorder),
            })),
        }
    }
}

struct FakeConnection {
    server_name: String,
    behavior: Behavior,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl UpstreamConnection for FakeConnection {
    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        match &self.behavior {
            Behavior::Healthy {
                tools, list_delay, ..
            } => {
                if let Some(delay) = list_delay {
                    tokio::time::sleep(*delay).await;
                }
                Ok(tools.clone())
            }
            Behavior::ListFails(message) => Err(McpError::upstream(message.clone())),
            Behavior::Unreachable => Err(McpError::ConnectionClosed(self.server_name.clone())),
        }
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> McpResult<Value> {
        self.recorder.calls.lock().unwrap().push((
            self.server_name.clone(),
            tool_name.to_string(),
            arguments.clone(),
        ));
        match &self.behavior {
            Behavior::Healthy {
                call_error: Some((message, data)),
                ..
            } => Err(McpError::Upstream {
                message: message.clone(),
                data: data.clone(),
            }),
            Behavior::Healthy {
                call_result: Some(result),
                ..
            } => Ok(result.clone()),
            _ => {
                let echo = Value::Object(arguments.unwrap_or_default());
                let result = CallToolResult::success(vec![Content::text(format!(
                    "{}:{}:{}",
                    self.server_name, tool_name, echo
                ))]);
                serde_json::to_value(result).map_err(|e| McpError::Transport(e.to_string()))
            }
        }
    }

    async fn close(self: Box<Self>) -> McpResult<()> {
        if let Behavior::Healthy {
            close_delay: Some(delay),
            ..
        } = &self.behavior
        {
            tokio::time::sleep(*delay).await;
        }
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
