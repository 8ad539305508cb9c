//! Server side of the tool protocol.
//!
//! `ProtocolServer` exposes any `ToolProvider` over JSON-RPC. Each client
//! connection gets its own `ProtocolSession`; the capabilities announced by
//! `initialize` are fixed for that session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use toolweave_core::{RoutingError, ToolInfo, ToolResult};

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
    ToolsCapability, WireTool,
};

/// A source of tools served over the protocol.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Tools currently offered.
    async fn list_tools(&self) -> Vec<ToolInfo>;

    /// Run one tool. Tool-level failures are reported inside the result;
    /// `Err` is reserved for calls that cannot be routed at all.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, RoutingError>;

    /// Told whether at least one client session is initialized.
    fn mark_live(&self, live: bool);
}

/// Protocol surface over a `ToolProvider`.
pub struct ProtocolServer {
    provider: Arc<dyn ToolProvider>,
    info: ServerInfo,
    /// Held across `mark_live` so the provider sees transitions in counter order.
    live_sessions: Mutex<usize>,
}

impl ProtocolServer {
    pub fn new(provider: Arc<dyn ToolProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            info: ServerInfo {
                name: name.into(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            live_sessions: Mutex::new(0),
        }
    }

    /// Start a new client session.
    pub fn open_session(self: &Arc<Self>) -> ProtocolSession {
        ProtocolSession {
            id: uuid::Uuid::new_v4().to_string(),
            server: Arc::clone(self),
            tools_announced: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of initialized, not yet closed sessions.
    pub fn live_sessions(&self) -> usize {
        *self.lock_live()
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, usize> {
        self.live_sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn session_initialized(&self) {
        let mut live = self.lock_live();
        *live += 1;
        if *live == 1 {
            self.provider.mark_live(true);
        }
    }

    fn session_closed(&self) {
        let mut live = self.lock_live();
        *live = live.saturating_sub(1);
        if *live == 0 {
            self.provider.mark_live(false);
        }
    }
}

/// One client session of a `ProtocolServer`.
pub struct ProtocolSession {
    id: String,
    server: Arc<ProtocolServer>,
    tools_announced: AtomicBool,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl ProtocolSession {
    /// Session id, unique per server.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether `initialize` announced the tools capability.
    pub fn tools_announced(&self) -> bool {
        self.tools_announced.load(Ordering::SeqCst)
    }

    /// Handle one message. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(session = %self.id, method = %request.method, "Notification");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize().await),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools().await,
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    /// End the session. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.initialized.load(Ordering::SeqCst) {
            self.server.session_closed();
        }
        tracing::debug!(session = %self.id, "Protocol session closed");
    }

    async fn initialize(&self) -> Value {
        let tools = self.server.provider.list_tools().await;
        let announce = !tools.is_empty();
        self.tools_announced.store(announce, Ordering::SeqCst);

        if !self.initialized.swap(true, Ordering::SeqCst) {
            self.server.session_initialized();
        }

        tracing::debug!(
            session = %self.id,
            tool_count = tools.len(),
            "Protocol session initialized"
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: announce.then(ToolsCapability::default),
                ..ServerCapabilities::default()
            },
            server_info: self.server.info.clone(),
        };
        serde_json::to_value(result).unwrap_or_else(|_| json!({}))
    }

    async fn list_tools(&self) -> Result<Value, JsonRpcError> {
        let tools = self.server.provider.list_tools().await;
        let result = ListToolsResult {
            tools: tools.iter().map(WireTool::from).collect(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        let result = self
            .server
            .provider
            .call_tool(&params.name, params.arguments)
            .await
            .map_err(|e| match &e {
                RoutingError::UnknownTool(_) => JsonRpcError::invalid_params(e.to_string()),
                _ => JsonRpcError::internal(e.to_string()),
            })?;

        serde_json::to_value(CallToolResult::from(result))
            .map_err(|e| JsonRpcError::internal(e.to_string()))
    }
}

impl Drop for ProtocolSession {
    fn drop(&mut self) {
        self.close();
    }
}
