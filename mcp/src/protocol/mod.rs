//! MCP protocol surface of a wallet.

pub mod jsonrpc;
pub mod router;

pub use jsonrpc::{
    InboundMessage, InboundMethod, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    DEFAULT_PROTOCOL_VERSION,
};
pub use router::{ProtocolRouter, ServerIdentity};
