//! Canonical event union for registry and automation lifecycle events.
//!
//! Observers subscribe to a stream of these events instead of registering
//! callbacks. Every server event carries a full snapshot of the new state, so
//! a subscriber never observes a partially-mutated `ServerState`.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "server_state_changed", "serverId": "search", "state": { ... } }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ServerState, ServerStatus};

/// Canonical event types for all adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== Server Events ==========
    /// A server's state changed (added, connecting, connected, errored).
    ServerStateChanged {
        /// Id of the server.
        #[serde(rename = "serverId")]
        server_id: String,
        /// Snapshot of the new state.
        state: ServerState,
    },

    /// A server was removed from the registry.
    ServerRemoved {
        /// Id of the removed server.
        #[serde(rename = "serverId")]
        server_id: String,
    },

    // ========== Automation Events ==========
    /// A batch of automation definitions was accepted.
    DefinitionsLoaded {
        /// Names in the accepted batch.
        names: Vec<String>,
        /// True when the protocol surface must be restarted to announce them.
        #[serde(rename = "restartRequired")]
        restart_required: bool,
    },

    /// An automation definition was removed.
    DefinitionRemoved {
        /// Name of the removed definition.
        name: String,
    },

    /// An automation run finished.
    AutomationFinished {
        /// Tool name.
        name: String,
        /// Whether the run (including lanes) succeeded.
        success: bool,
        /// Number of executed steps in the main lane.
        steps: usize,
    },
}

impl AppEvent {
    /// Create a server state event from a snapshot.
    pub fn server_state_changed(state: &ServerState) -> Self {
        Self::ServerStateChanged {
            server_id: state.config.id.clone(),
            state: state.clone(),
        }
    }

    /// Create a server removed event.
    pub fn server_removed(server_id: impl Into<String>) -> Self {
        Self::ServerRemoved {
            server_id: server_id.into(),
        }
    }

    /// Create a definitions loaded event.
    pub const fn definitions_loaded(names: Vec<String>, restart_required: bool) -> Self {
        Self::DefinitionsLoaded {
            names,
            restart_required,
        }
    }

    /// Create a definition removed event.
    pub fn definition_removed(name: impl Into<String>) -> Self {
        Self::DefinitionRemoved { name: name.into() }
    }

    /// Create an automation finished event.
    pub fn automation_finished(name: impl Into<String>, success: bool, steps: usize) -> Self {
        Self::AutomationFinished {
            name: name.into(),
            success,
            steps,
        }
    }

    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ServerStateChanged { state, .. } => match state.status {
                ServerStatus::Disconnected => "server:disconnected",
                ServerStatus::Connecting => "server:connecting",
                ServerStatus::Connected => "server:connected",
                ServerStatus::Error => "server:error",
            },
            Self::ServerRemoved { .. } => "server:removed",
            Self::DefinitionsLoaded { .. } => "automation:loaded",
            Self::DefinitionRemoved { .. } => "automation:removed",
            Self::AutomationFinished { .. } => "automation:finished",
        }
    }
}
