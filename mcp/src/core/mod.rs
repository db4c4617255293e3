//! Core wallet engine: upstream sessions, aggregation and dispatch.

pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod metrics;
pub mod proxy;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    CallToolResult, ConnectorConfig, Content, JsonObject, McpProxyConfig, Tool, UpstreamServer,
    UpstreamTransport, Wallet,
};
pub use connector::{
    client_info_for, RmcpUpstreamClient, ScopedConnection, UpstreamConnection,
    UpstreamProtocolClient,
};
pub use dispatcher::{
    Discovery, EndpointStatus, EndpointStatusMap, NoopUsageRecorder, ToolDescriptor,
    UsageRecorder, WalletDispatcher,
};
pub use metrics::{LatencySnapshot, McpMetrics, MetricsSnapshot};
