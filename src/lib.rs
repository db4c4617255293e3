//! MCP wallet gateway.
//!
//! Serves wallets over the MCP streamable HTTP binding on top of the
//! `wallet_mcp` engine.

pub mod config;
pub mod logging;
pub mod server;
pub mod wallet;

pub use config::{ConfigError, GatewayConfig};
pub use server::{build_app, AppState, GatewayError};
