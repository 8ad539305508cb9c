#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod client;
pub mod executor;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

// Re-export domain types from core for convenience
pub use toolweave_core::{ContentItem, ServerConfig, ServerState, ToolCall, ToolInfo, ToolResult};

// Re-export this crate's public types
pub use client::{ConnectionError, ToolServerConnection};
pub use executor::{RetryPolicy, ToolExecutor};
pub use protocol::{InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerInfo};
pub use registry::{ServerRegistry, ToolInvoker};
pub use server::{ProtocolServer, ProtocolSession, ToolProvider};
pub use transport::{
    Connector, HttpTransport, InProcessDirectory, InProcessTransport, SESSION_HEADER,
    StreamProbe, Transport, TransportError,
};

#[cfg(test)]
use axum as _;
