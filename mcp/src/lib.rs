//! MCP wallet engine.
//!
//! Aggregates tools from several upstream MCP servers behind one wallet and
//! dispatches calls back to the server that owns each tool.
//!
//! ## Modules
//!
//! - [`namespace`]: `server.tool` naming
//! - [`core`]: upstream sessions, discovery fan-out, call dispatch, metrics
//! - [`protocol`]: JSON-RPC envelopes and the per-message router

pub mod core;
pub mod error;
pub mod namespace;
pub mod protocol;

pub use core::{
    ConnectorConfig, Discovery, EndpointStatus, EndpointStatusMap, McpMetrics, McpProxyConfig,
    MetricsSnapshot, NoopUsageRecorder, RmcpUpstreamClient, ToolDescriptor, UpstreamConnection,
    UpstreamProtocolClient, UpstreamServer, UsageRecorder, Wallet, WalletDispatcher,
};
pub use error::{McpError, McpResult};
pub use namespace::NamespacedToolName;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, ProtocolRouter, ServerIdentity};
