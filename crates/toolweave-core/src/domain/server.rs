//! Tool server domain types.
//!
//! These types describe a tool server as the registry sees it, independent of
//! the transport used to reach it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tool::ToolInfo;

/// Where a server configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerOrigin {
    /// Shipped with the application (e.g. the automation server).
    Builtin,
    /// Added by the user at runtime or through settings.
    #[default]
    User,
}

/// How to reach a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    /// Streamable HTTP endpoint (e.g. `http://localhost:3001/mcp`).
    Http {
        /// Absolute http(s) URL of the JSON-RPC endpoint.
        url: String,
    },
    /// A protocol handler living in the same process, addressed by channel id.
    InProcess {
        /// Channel id the handler was registered under.
        channel: String,
    },
}

impl Endpoint {
    /// Create an HTTP endpoint.
    pub fn http(url: impl Into<String>) -> Self {
        Self::Http { url: url.into() }
    }

    /// Create an in-process endpoint.
    pub fn in_process(channel: impl Into<String>) -> Self {
        Self::InProcess {
            channel: channel.into(),
        }
    }

    /// Human-readable locator, used in logs and error messages.
    pub fn locator(&self) -> String {
        match self {
            Self::Http { url } => url.clone(),
            Self::InProcess { channel } => format!("inproc://{channel}"),
        }
    }
}

/// Configuration of a single tool server.
///
/// Immutable once registered: replacing a server means removing it and adding
/// the new configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Stable unique identifier, used for routing.
    pub id: String,

    /// User-friendly name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Category tag used to group servers in listings.
    #[serde(default)]
    pub category: String,

    /// Endpoint locator.
    pub endpoint: Endpoint,

    /// Static headers sent with every request (HTTP endpoints only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Where this configuration came from.
    #[serde(default)]
    pub origin: ServerOrigin,
}

impl ServerConfig {
    /// Create a user server reachable over HTTP.
    pub fn http(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            endpoint: Endpoint::http(url),
            headers: BTreeMap::new(),
            origin: ServerOrigin::User,
        }
    }

    /// Create a built-in server served by an in-process handler.
    pub fn in_process(
        id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            endpoint: Endpoint::in_process(channel),
            headers: BTreeMap::new(),
            origin: ServerOrigin::Builtin,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category tag.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Add a static header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Validate the configuration.
    ///
    /// Returns an error if required fields are missing or the endpoint cannot
    /// be reached by any transport.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Server id cannot be empty".to_string());
        }
        if self.id.contains(char::is_whitespace) {
            return Err(format!("Server id must not contain whitespace: {}", self.id));
        }

        match &self.endpoint {
            Endpoint::Http { url } => {
                let parsed = url::Url::parse(url)
                    .map_err(|e| format!("Invalid server url '{url}': {e}"))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(format!(
                        "Server url must use http or https, got '{}'",
                        parsed.scheme()
                    ));
                }
            }
            Endpoint::InProcess { channel } => {
                if channel.trim().is_empty() {
                    return Err("In-process channel id cannot be empty".to_string());
                }
            }
        }

        Ok(())
    }
}

/// Lifecycle status of a registered server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Not connected.
    #[default]
    Disconnected,
    /// Handshake and discovery in progress.
    Connecting,
    /// Connected and tools discovered.
    Connected,
    /// Connection or discovery failed; see `ServerState::error`.
    Error,
}

impl ServerStatus {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime state of a registered server.
///
/// Owned and mutated by the registry only; everything handed out is a
/// snapshot clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    /// The server configuration.
    pub config: ServerConfig,

    /// Current lifecycle status.
    pub status: ServerStatus,

    /// Discovered tools (empty unless connected).
    #[serde(default)]
    pub tools: Vec<ToolInfo>,

    /// Last connection or discovery error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last successful connection time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl ServerState {
    /// Fresh state for a newly added server.
    pub const fn new(config: ServerConfig) -> Self {
        Self {
            config,
            status: ServerStatus::Disconnected,
            tools: Vec::new(),
            error: None,
            last_connected_at: None,
        }
    }

    /// Server id shortcut.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Whether tools from this server may be listed and called.
    pub fn is_connected(&self) -> bool {
        self.status == ServerStatus::Connected
    }

    /// Transition to `connecting`, clearing previous tools and error.
    pub fn mark_connecting(&mut self) {
        self.status = ServerStatus::Connecting;
        self.tools.clear();
        self.error = None;
    }

    /// Transition to `connected` with the discovered tools.
    pub fn mark_connected(&mut self, tools: Vec<ToolInfo>) {
        self.status = ServerStatus::Connected;
        self.tools = tools;
        self.error = None;
        self.last_connected_at = Some(Utc::now());
    }

    /// Transition to `error`. Tools are always dropped.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = ServerStatus::Error;
        self.tools.clear();
        self.error = Some(message.into());
    }

    /// Transition to `disconnected`.
    pub fn mark_disconnected(&mut self) {
        self.status = ServerStatus::Disconnected;
        self.tools.clear();
    }
}
