//! Remote action bridge.
//!
//! The browser is driven by an out-of-process controller. Every command is a
//! `CommandEnvelope` sent over a `CommandChannel`; the controller answers with
//! a `BridgeReply` correlated by id. The bridge enforces a hard timeout on
//! every command and addresses commands by lane so independent lanes can use
//! independent tabs.
//!
//! # Wire Format
//!
//! ```json
//! { "type": "command", "id": "…", "action": "click",
//!   "payload": { "selector": "#buy", "tabId": 17, "laneId": "main" } }
//! ```
//!
//! Replies: `{ "success": true, "data": … }` or `{ "success": false, "error": "…" }`.

mod channel;
mod pool;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::{RwLock, oneshot};
use toolweave_core::{DEFAULT_COMMAND_TIMEOUT_SECS, ExtractField, MAIN_LANE, ScrollDirection};

pub use channel::{ChannelCommandChannel, PendingCommand};
pub use pool::BridgePool;

/// Browser tab handle assigned by the controller.
pub type TabId = i64;

/// Default hard timeout for one command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS);

/// Errors from the remote action bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Command '{action}' timed out after {}s", .timeout.as_secs())]
    CommandTimeout { action: String, timeout: Duration },

    #[error("Failed to deliver command: {0}")]
    Delivery(String),

    #[error("Browser reported an error: {0}")]
    Remote(String),

    #[error("No tab open in lane '{0}'")]
    NoTab(String),

    #[error("Controller disconnected before replying")]
    Closed,

    #[error("Invalid reply: {0}")]
    InvalidReply(String),
}

impl BridgeError {
    /// False when the command may or may not have run in the browser.
    pub const fn is_definitive(&self) -> bool {
        !matches!(self, Self::CommandTimeout { .. } | Self::Closed)
    }
}

/// A command sent to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub action: String,
    pub payload: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn new(action: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: "command".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }
}

/// The controller's answer to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeReply {
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// A reply as it arrives on a shared connection, carrying the command id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: String,
    #[serde(flatten)]
    pub reply: BridgeReply,
}

/// Delivery of commands to the browser controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Hand the command to the controller. The receiver resolves with the
    /// reply; a dropped sender means the controller went away.
    async fn dispatch(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<oneshot::Receiver<BridgeReply>, BridgeError>;

    /// Forget a pending command (after its timeout).
    fn cancel(&self, _id: &str) {}
}

/// Lane-addressed bridge to one browser tab.
pub struct RemoteActionBridge {
    channel: Arc<dyn CommandChannel>,
    lane_id: String,
    timeout: Duration,
    tab_id: RwLock<Option<TabId>>,
}

impl RemoteActionBridge {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        lane_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            lane_id: lane_id.into(),
            timeout,
            tab_id: RwLock::new(None),
        }
    }

    /// Bridge on the `main` lane with the default timeout.
    pub fn main(channel: Arc<dyn CommandChannel>) -> Self {
        Self::new(channel, MAIN_LANE, DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn lane_id(&self) -> &str {
        &self.lane_id
    }

    pub async fn tab_id(&self) -> Option<TabId> {
        *self.tab_id.read().await
    }

    /// Send one command and wait for its reply, at most `timeout` in total.
    ///
    /// The payload is extended with `tabId` (when a tab is open) and `laneId`.
    pub async fn command(
        &self,
        action: &str,
        mut payload: Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        if let Some(tab_id) = self.tab_id().await {
            payload.insert("tabId".to_string(), json!(tab_id));
        }
        payload.insert("laneId".to_string(), json!(self.lane_id));

        let envelope = CommandEnvelope::new(action, payload);
        let id = envelope.id.clone();
        tracing::trace!(lane = %self.lane_id, action, id = %id, "Dispatching bridge command");

        // One deadline covers both queueing and the reply: a controller that
        // stops draining its queue must not stall the caller.
        let exchange = async {
            let receiver = self.channel.dispatch(envelope).await?;
            receiver.await.map_err(|_| BridgeError::Closed)
        };

        let reply = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                self.channel.cancel(&id);
                tracing::warn!(
                    lane = %self.lane_id,
                    action,
                    timeout_secs = self.timeout.as_secs(),
                    "Bridge command timed out"
                );
                return Err(BridgeError::CommandTimeout {
                    action: action.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if reply.success {
            Ok(reply.data.unwrap_or(Value::Null))
        } else {
            Err(BridgeError::Remote(
                reply
                    .error
                    .unwrap_or_else(|| format!("{action} failed")),
            ))
        }
    }

    async fn tab_command(
        &self,
        action: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        if self.tab_id().await.is_none() {
            return Err(BridgeError::NoTab(self.lane_id.clone()));
        }
        self.command(action, payload).await
    }

    /// Open a tab for this lane and remember it.
    pub async fn open(&self, url: &str, background: bool) -> Result<TabId, BridgeError> {
        let data = self
            .command("open", args(json!({ "url": url, "background": background })))
            .await?;

        let tab_id = data
            .as_i64()
            .or_else(|| data.get("tabId").and_then(Value::as_i64))
            .ok_or_else(|| BridgeError::InvalidReply(format!("open returned no tab id: {data}")))?;

        *self.tab_id.write().await = Some(tab_id);
        tracing::debug!(lane = %self.lane_id, tab_id, "Opened tab");
        Ok(tab_id)
    }

    /// Close this lane's tab. No-op without a tab.
    pub async fn close(&self) -> Result<(), BridgeError> {
        if self.tab_id().await.is_none() {
            return Ok(());
        }
        let result = self.command("close", Map::new()).await;
        *self.tab_id.write().await = None;
        result.map(|_| ())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), BridgeError> {
        self.tab_command("navigate", args(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    pub async fn click(&self, selector: &str) -> Result<(), BridgeError> {
        self.tab_command("click", args(json!({ "selector": selector })))
            .await
            .map(|_| ())
    }

    pub async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<(), BridgeError> {
        self.tab_command(
            "type",
            args(json!({ "selector": selector, "text": text, "clear": clear })),
        )
        .await
        .map(|_| ())
    }

    pub async fn get_text(&self, selector: &str) -> Result<Option<String>, BridgeError> {
        let data = self
            .tab_command("getText", args(json!({ "selector": selector })))
            .await?;
        Ok(data.as_str().map(str::to_string))
    }

    pub async fn get_attribute(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, BridgeError> {
        let data = self
            .tab_command(
                "getAttribute",
                args(json!({ "selector": selector, "attribute": attribute })),
            )
            .await?;
        Ok(data.as_str().map(str::to_string))
    }

    pub async fn get_value(&self, selector: &str) -> Result<Option<String>, BridgeError> {
        let data = self
            .tab_command("getValue", args(json!({ "selector": selector })))
            .await?;
        Ok(data.as_str().map(str::to_string))
    }

    pub async fn exists(&self, selector: &str) -> Result<bool, BridgeError> {
        let data = self
            .tab_command("exists", args(json!({ "selector": selector })))
            .await?;
        Ok(data.as_bool().unwrap_or(false))
    }

    /// Outer HTML of `selector`, or of the document without one.
    pub async fn get_html(&self, selector: Option<&str>) -> Result<String, BridgeError> {
        let data = self
            .tab_command("getHtml", args(json!({ "selector": selector })))
            .await?;
        Ok(data.as_str().unwrap_or_default().to_string())
    }

    pub async fn select(&self, selector: &str, value: &str) -> Result<(), BridgeError> {
        self.tab_command("select", args(json!({ "selector": selector, "value": value })))
            .await
            .map(|_| ())
    }

    pub async fn scroll(
        &self,
        selector: Option<&str>,
        direction: ScrollDirection,
        amount: Option<u32>,
    ) -> Result<(), BridgeError> {
        self.tab_command(
            "scroll",
            args(json!({
                "selector": selector,
                "direction": direction.as_str(),
                "amount": amount,
            })),
        )
        .await
        .map(|_| ())
    }

    /// One record per element matching `selector`.
    pub async fn extract_list(
        &self,
        selector: &str,
        fields: &[ExtractField],
    ) -> Result<Value, BridgeError> {
        self.tab_command(
            "extractList",
            args(json!({ "selector": selector, "fields": fields })),
        )
        .await
    }

    /// One record from the first element matching `selector`.
    pub async fn extract_single(
        &self,
        selector: &str,
        fields: &[ExtractField],
    ) -> Result<Value, BridgeError> {
        self.tab_command(
            "extractSingle",
            args(json!({ "selector": selector, "fields": fields })),
        )
        .await
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout_ms: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.tab_command(
            "waitForSelector",
            args(json!({ "selector": selector, "timeout": timeout_ms })),
        )
        .await
        .map(|_| ())
    }

    pub async fn wait_for_url(&self, pattern: &str, timeout_ms: Option<u64>) -> Result<(), BridgeError> {
        self.tab_command(
            "waitForUrl",
            args(json!({ "pattern": pattern, "timeout": timeout_ms })),
        )
        .await
        .map(|_| ())
    }

    pub async fn wait_for_load(&self, timeout_ms: Option<u64>) -> Result<(), BridgeError> {
        self.tab_command("waitForLoad", args(json!({ "timeout": timeout_ms })))
            .await
            .map(|_| ())
    }

    /// Run a script in the page and return its result.
    pub async fn evaluate(&self, script: &str) -> Result<Value, BridgeError> {
        self.tab_command("evaluate", args(json!({ "script": script })))
            .await
    }
}

/// Object literal to payload map, dropping nulls.
fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}
