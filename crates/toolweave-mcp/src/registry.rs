//! Registry of named tool-server connections.
//!
//! The registry is the single owner of every `ServerState`. Each entry carries
//! a generation number so a slow `add_server` that was superseded by a later
//! add or remove never overwrites the newer entry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use toolweave_core::{
    AppEvent, AppEventEmitter, RoutingError, ServerConfig, ServerState, ToolCall, ToolInfo,
    ToolResult,
};

use crate::client::{ConnectionError, ToolServerConnection};
use crate::transport::Connector;

/// Port through which the executor reaches tool backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Route one call. Never fails; routing problems become failed results.
    async fn invoke(&self, call: ToolCall) -> ToolResult;
}

struct Entry {
    state: ServerState,
    connection: Option<Arc<ToolServerConnection>>,
    generation: u64,
}

/// Named tool-server connections with lifecycle state.
pub struct ServerRegistry {
    connector: Connector,
    entries: RwLock<BTreeMap<String, Entry>>,
    generation: AtomicU64,
    emitter: Arc<dyn AppEventEmitter>,
}

impl ServerRegistry {
    pub fn new(connector: Connector, emitter: Arc<dyn AppEventEmitter>) -> Self {
        Self {
            connector,
            entries: RwLock::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            emitter,
        }
    }

    /// Register a server, connect to it and discover its tools.
    ///
    /// An existing entry with the same id is removed first. Connection or
    /// discovery failure leaves the entry in `error` with no tools; it is
    /// still registered so its state can be inspected.
    pub async fn add_server(&self, config: ServerConfig) -> ServerState {
        let server_id = config.id.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = ServerState::new(config.clone());

        if let Err(message) = config.validate() {
            tracing::warn!(server_id = %server_id, error = %message, "Invalid server configuration");
            state.mark_error(message);
            self.replace(generation, state.clone()).await;
            return state;
        }

        state.mark_connecting();
        self.replace(generation, state.clone()).await;

        let connection = match self.connect(&config).await {
            Ok((connection, tools)) => {
                tracing::info!(
                    server_id = %server_id,
                    tool_count = tools.len(),
                    "Tool server connected"
                );
                state.mark_connected(tools);
                Some(connection)
            }
            Err(e) => {
                tracing::warn!(
                    server_id = %server_id,
                    error = %e,
                    definitive = e.is_definitive(),
                    "Tool server connection failed"
                );
                state.mark_error(e.to_string());
                None
            }
        };

        if !self
            .store(generation, state.clone(), connection.clone())
            .await
        {
            tracing::debug!(server_id = %server_id, "Discarding superseded connection");
            if let Some(connection) = connection {
                connection.disconnect().await;
            }
        }
        state
    }

    async fn connect(
        &self,
        config: &ServerConfig,
    ) -> Result<(Arc<ToolServerConnection>, Vec<ToolInfo>), ConnectionError> {
        let transport = self.connector.open(config).await?;
        let connection = Arc::new(ToolServerConnection::new(&config.id, transport));
        connection.connect().await?;

        match connection.list_tools().await {
            Ok(tools) => Ok((connection, tools)),
            Err(e) => {
                connection.disconnect().await;
                Err(e)
            }
        }
    }

    /// Insert a fresh entry, displacing any entry with the same id in the
    /// same write. The displaced connection is closed afterwards.
    async fn replace(&self, generation: u64, state: ServerState) {
        let id = state.config.id.clone();
        let displaced = self.entries.write().await.insert(
            id.clone(),
            Entry {
                state: state.clone(),
                connection: None,
                generation,
            },
        );

        if let Some(entry) = displaced {
            if let Some(connection) = entry.connection {
                connection.disconnect().await;
            }
            tracing::info!(server_id = %id, "Tool server replaced");
            self.emitter.emit(AppEvent::server_removed(&id));
        }
        self.emitter.emit(AppEvent::server_state_changed(&state));
    }

    /// Update an entry if `generation` is still current. Returns whether the
    /// write happened.
    async fn store(
        &self,
        generation: u64,
        state: ServerState,
        connection: Option<Arc<ToolServerConnection>>,
    ) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&state.config.id) {
            Some(entry) if entry.generation == generation => {
                entry.state = state.clone();
                entry.connection = connection;
            }
            _ => return false,
        }
        drop(entries);

        self.emitter.emit(AppEvent::server_state_changed(&state));
        true
    }

    /// Remove a server and close its connection. Unknown ids are ignored.
    pub async fn remove_server(&self, server_id: &str) {
        let removed = self.entries.write().await.remove(server_id);
        let Some(entry) = removed else {
            return;
        };

        if let Some(connection) = entry.connection {
            connection.disconnect().await;
        }
        tracing::info!(server_id = %server_id, "Tool server removed");
        self.emitter.emit(AppEvent::server_removed(server_id));
    }

    /// Re-run connect and discovery with the server's current configuration.
    pub async fn reconnect(&self, server_id: &str) -> Option<ServerState> {
        let config = self
            .entries
            .read()
            .await
            .get(server_id)
            .map(|e| e.state.config.clone())?;
        Some(self.add_server(config).await)
    }

    /// Tools of every connected server.
    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.state.is_connected())
            .flat_map(|e| e.state.tools.iter().cloned())
            .collect()
    }

    pub async fn get_state(&self, server_id: &str) -> Option<ServerState> {
        self.entries
            .read()
            .await
            .get(server_id)
            .map(|e| e.state.clone())
    }

    /// Snapshot of every server, ordered by id.
    pub async fn list_states(&self) -> Vec<ServerState> {
        self.entries
            .read()
            .await
            .values()
            .map(|e| e.state.clone())
            .collect()
    }

    pub async fn server_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Route a call to its server.
    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> ToolResult {
        let connection = {
            let entries = self.entries.read().await;
            let Some(entry) = entries.get(server_id) else {
                return RoutingError::UnknownServer(server_id.to_string()).into();
            };
            match (&entry.connection, entry.state.is_connected()) {
                (Some(connection), true) => Arc::clone(connection),
                _ => {
                    return RoutingError::NotConnected {
                        server_id: server_id.to_string(),
                        status: entry.state.status.to_string(),
                    }
                    .into();
                }
            }
        };

        connection.call_tool(tool_name, arguments).await
    }

    /// Close every connection concurrently and clear the registry.
    pub async fn disconnect_all(&self) {
        let entries = std::mem::take(&mut *self.entries.write().await);
        let count = entries.len();

        join_all(entries.values().filter_map(|e| e.connection.as_ref()).map(|c| c.disconnect()))
            .await;

        for id in entries.keys() {
            self.emitter.emit(AppEvent::server_removed(id.as_str()));
        }
        tracing::info!(count, "Disconnected all tool servers");
    }
}

#[async_trait]
impl ToolInvoker for ServerRegistry {
    async fn invoke(&self, call: ToolCall) -> ToolResult {
        self.call_tool(&call.server_id, &call.tool_name, call.arguments)
            .await
    }
}
