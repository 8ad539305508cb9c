//! Client side of one tool-server session.
//!
//! A `ToolServerConnection` owns one transport and performs the protocol
//! handshake, discovery and invocation on it. All methods take `&self` so a
//! connection can be shared across concurrent calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use toolweave_core::{ToolInfo, ToolResult};

use crate::protocol::{
    CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest, ListToolsResult,
    PROTOCOL_VERSION, ServerInfo,
};
use crate::transport::{StreamProbe, Transport, TransportError};

/// Upper bound on `tools/list` pages followed for one discovery.
const MAX_TOOL_PAGES: usize = 64;

/// Errors that can occur on a tool-server connection.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("Server not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Server returned error: {0}")]
    Rpc(#[from] JsonRpcError),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::UnexpectedStatus { status, body } => {
                Self::UnexpectedStatus { status, body }
            }
            other => Self::Transport(other),
        }
    }
}

impl ConnectionError {
    /// True when the server answered and the answer was a failure, false
    /// when the outcome could not be determined (network error, timeout).
    pub const fn is_definitive(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_definitive(),
            Self::NotConnected
            | Self::UnexpectedStatus { .. }
            | Self::Rpc(_)
            | Self::Protocol(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    init: InitializeResult,
    streaming: bool,
}

/// One protocol session with one tool server.
pub struct ToolServerConnection {
    server_id: String,
    transport: Arc<dyn Transport>,
    request_id: AtomicU64,
    session: RwLock<Option<Session>>,
}

impl ToolServerConnection {
    /// Wrap a transport. Nothing is sent until `connect`.
    pub fn new(server_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            server_id: server_id.into(),
            transport,
            request_id: AtomicU64::new(1),
            session: RwLock::new(None),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Perform the handshake: `initialize`, `notifications/initialized`, then
    /// the optional stream probe.
    ///
    /// A server that does not stream (HTTP 405) is fine; any other failed
    /// probe fails the connection. On failure the transport is released.
    pub async fn connect(&self) -> Result<InitializeResult, ConnectionError> {
        match self.handshake().await {
            Ok(session) => {
                let init = session.init.clone();
                *self.session.write().await = Some(session);
                Ok(init)
            }
            Err(e) => {
                self.transport.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<Session, ConnectionError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": "toolweave",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {}
        });

        let init: InitializeResult = self.request("initialize", Some(params)).await?;

        self.transport
            .send(JsonRpcRequest::notification(
                "notifications/initialized",
                None,
            ))
            .await?;

        let streaming = match self.transport.probe_stream().await? {
            StreamProbe::Available => true,
            StreamProbe::Unsupported => {
                tracing::debug!(
                    server_id = %self.server_id,
                    "Server does not stream, continuing without"
                );
                false
            }
        };

        tracing::info!(
            server_id = %self.server_id,
            server = %init.server_info.name,
            protocol_version = %init.protocol_version,
            has_tools = init.capabilities.has_tools(),
            streaming,
            "Connected to tool server"
        );

        Ok(Session { init, streaming })
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Server info from the handshake.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.init.server_info.clone())
    }

    /// Whether the server offered a server-initiated stream.
    pub async fn is_streaming(&self) -> bool {
        self.session.read().await.as_ref().is_some_and(|s| s.streaming)
    }

    /// Discover the server's tools, following pagination.
    ///
    /// Returns an empty list when the server did not announce tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, ConnectionError> {
        let has_tools = self
            .session
            .read()
            .await
            .as_ref()
            .ok_or(ConnectionError::NotConnected)?
            .init
            .capabilities
            .has_tools();
        if !has_tools {
            return Ok(Vec::new());
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;

            tools.extend(
                page.tools
                    .into_iter()
                    .map(|t| t.into_tool_info(&self.server_id)),
            );

            match page.next_cursor {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(
            server_id = %self.server_id,
            pages = MAX_TOOL_PAGES,
            "Stopped following tools/list pagination"
        );
        Ok(tools)
    }

    /// Call a tool. Never fails: every error is captured in the result.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> ToolResult {
        if !self.is_connected().await {
            return ToolResult::error(ConnectionError::NotConnected.to_string());
        }

        let params = json!({
            "name": name,
            "arguments": arguments
        });

        match self.request::<CallToolResult>("tools/call", Some(params)).await {
            Ok(result) => result.into_tool_result(),
            Err(e) => {
                tracing::debug!(
                    server_id = %self.server_id,
                    tool = name,
                    error = %e,
                    "Tool call failed"
                );
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Health check.
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        if !self.is_connected().await {
            return Err(ConnectionError::NotConnected);
        }
        self.request::<Value>("ping", None).await.map(|_| ())
    }

    /// Close the session. Safe to call more than once.
    pub async fn disconnect(&self) {
        if self.session.write().await.take().is_some() {
            self.transport.close().await;
            tracing::debug!(server_id = %self.server_id, "Disconnected from tool server");
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ConnectionError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let response = self
            .transport
            .send(JsonRpcRequest::new(id, method, params))
            .await?
            .ok_or_else(|| ConnectionError::Protocol(format!("No response to {method}")))?;

        let result = response.into_result()?;
        serde_json::from_value(result)
            .map_err(|e| ConnectionError::Protocol(format!("Invalid {method} result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcResponse, METHOD_NOT_FOUND};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted transport answering by method name.
    struct ScriptedTransport {
        capabilities: Value,
        probe: Result<StreamProbe, TransportError>,
        pages: Vec<Value>,
        sent: Mutex<Vec<JsonRpcRequest>>,
        closed: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(capabilities: Value) -> Self {
            Self {
                capabilities,
                probe: Ok(StreamProbe::Unsupported),
                pages: Vec::new(),
                sent: Mutex::new(Vec::new()),
                closed: Mutex::new(0),
            }
        }

        fn methods(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.method.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: JsonRpcRequest,
        ) -> Result<Option<JsonRpcResponse>, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let Some(id) = request.id.clone() else {
                return Ok(None);
            };
            let result = match request.method.as_str() {
                "initialize" => json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": self.capabilities,
                    "serverInfo": { "name": "scripted" }
                }),
                "tools/list" => {
                    let page = request
                        .params
                        .as_ref()
                        .and_then(|p| p["cursor"].as_str())
                        .and_then(|c| c.parse::<usize>().ok())
                        .unwrap_or(0);
                    self.pages[page].clone()
                }
                "tools/call" => {
                    return Ok(Some(JsonRpcResponse::failure(
                        id,
                        JsonRpcError::new(-32000, "upstream exploded"),
                    )));
                }
                "ping" => json!({}),
                other => {
                    return Ok(Some(JsonRpcResponse::failure(
                        id,
                        JsonRpcError::method_not_found(other),
                    )));
                }
            };
            Ok(Some(JsonRpcResponse::success(id, result)))
        }

        async fn probe_stream(&self) -> Result<StreamProbe, TransportError> {
            self.probe.clone()
        }

        async fn close(&self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_list_tools_before_connect() {
        let transport = Arc::new(ScriptedTransport::new(json!({ "tools": {} })));
        let connection = ToolServerConnection::new("s", transport);
        assert!(matches!(
            connection.list_tools().await,
            Err(ConnectionError::NotConnected)
        ));
        let result = connection.call_tool("x", Map::new()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_handshake_sequence() {
        let transport = Arc::new(ScriptedTransport::new(json!({})));
        let connection = ToolServerConnection::new("s", transport.clone());
        connection.connect().await.unwrap();

        assert_eq!(
            transport.methods(),
            vec!["initialize", "notifications/initialized"]
        );
        assert!(!connection.is_streaming().await);
        // No tools capability: discovery short-circuits.
        assert!(connection.list_tools().await.unwrap().is_empty());
        assert_eq!(transport.methods().len(), 2);
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let mut transport = ScriptedTransport::new(json!({ "tools": {} }));
        transport.pages = vec![
            json!({ "tools": [{ "name": "a" }], "nextCursor": "1" }),
            json!({ "tools": [{ "name": "b", "description": "second" }] }),
        ];
        let connection = ToolServerConnection::new("s", Arc::new(transport));
        connection.connect().await.unwrap();

        let tools = connection.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(tools.iter().all(|t| t.server_id == "s"));
    }

    #[tokio::test]
    async fn test_failed_probe_fails_connect() {
        let mut transport = ScriptedTransport::new(json!({}));
        transport.probe = Err(TransportError::UnexpectedStatus {
            status: 500,
            body: "down".to_string(),
        });
        let transport = Arc::new(transport);
        let connection = ToolServerConnection::new("s", transport.clone());

        let err = connection.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::UnexpectedStatus { status: 500, .. }));
        assert!(!connection.is_connected().await);
        assert_eq!(*transport.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rpc_error_becomes_failed_result() {
        let transport = Arc::new(ScriptedTransport::new(json!({ "tools": {} })));
        let connection = ToolServerConnection::new("s", transport);
        connection.connect().await.unwrap();

        let result = connection.call_tool("boom", Map::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_ping_and_idempotent_disconnect() {
        let transport = Arc::new(ScriptedTransport::new(json!({})));
        let connection = ToolServerConnection::new("s", transport.clone());
        connection.connect().await.unwrap();
        connection.ping().await.unwrap();

        connection.disconnect().await;
        connection.disconnect().await;
        assert_eq!(*transport.closed.lock().unwrap(), 1);
        assert!(matches!(
            connection.ping().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[test]
    fn test_unknown_method_error_is_definitive() {
        let err = ConnectionError::from(JsonRpcError::method_not_found("x"));
        assert!(matches!(&err, ConnectionError::Rpc(e) if e.code == METHOD_NOT_FOUND));
        assert!(err.is_definitive());
        assert!(!ConnectionError::Transport(TransportError::Timeout).is_definitive());
    }
}
