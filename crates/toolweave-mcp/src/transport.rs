//! Transports carrying JSON-RPC messages to a tool server.
//!
//! - `HttpTransport` - streamable HTTP (POST for messages, optional GET stream)
//! - `InProcessTransport` - direct calls into a `ProtocolServer` living in the
//!   same process, looked up by channel name in an `InProcessDirectory`

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use tokio::sync::RwLock;
use toolweave_core::{Endpoint, ServerConfig};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::server::{ProtocolServer, ProtocolSession};

/// Header carrying the server-assigned session id.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

const ACCEPT_MESSAGES: &str = "application/json, text/event-stream";
const MAX_ERROR_BODY: usize = 512;

/// Errors raised while moving messages.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No in-process server registered on channel '{0}'")]
    UnknownChannel(String),

    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error.to_string())
        }
    }

    /// True when the peer answered and the answer was a failure.
    ///
    /// Network errors and timeouts are not definitive: the peer's state is
    /// unknown.
    pub const fn is_definitive(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. } | Self::InvalidResponse(_) | Self::UnknownChannel(_)
        )
    }
}

/// Outcome of the optional server-to-client stream probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProbe {
    /// The server offers a server-initiated message stream.
    Available,
    /// The server does not stream; requests still work.
    Unsupported,
}

/// A bidirectional JSON-RPC message carrier.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message. Notifications resolve to `None`.
    async fn send(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>, TransportError>;

    /// Probe for a server-initiated stream.
    async fn probe_stream(&self) -> Result<StreamProbe, TransportError>;

    /// Release the session. Best effort and idempotent.
    async fn close(&self);
}

// ============================================================================
// Streamable HTTP
// ============================================================================

/// Streamable HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: BTreeMap<String, String>,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            headers,
            session_id: RwLock::new(None),
        }
    }

    /// Session id assigned by the server, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn decorate(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(session_id) = self.session_id.read().await.as_deref() {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        builder
    }

    async fn capture_session(&self, response: &reqwest::Response) {
        let Some(value) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };

        let mut session_id = self.session_id.write().await;
        if session_id.as_deref() != Some(value) {
            tracing::debug!(url = %self.url, session_id = value, "Captured session id");
            *session_id = Some(value.to_string());
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>, TransportError> {
        let builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_MESSAGES)
            .json(&request);

        let response = self
            .decorate(builder)
            .await
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        self.capture_session(&response).await;

        let status = response.status();
        if !status.is_success() {
            return Err(unexpected_status(response).await);
        }

        if request.is_notification() {
            return Ok(None);
        }

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        if is_stream {
            parse_event_stream(&body)
                .into_iter()
                .find(|r| request.id.as_ref() == Some(&r.id))
                .map(Some)
                .ok_or_else(|| {
                    TransportError::InvalidResponse(
                        "event stream ended without a response".to_string(),
                    )
                })
        } else {
            serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| TransportError::InvalidResponse(e.to_string()))
        }
    }

    async fn probe_stream(&self) -> Result<StreamProbe, TransportError> {
        let builder = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream");

        let response = self
            .decorate(builder)
            .await
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(StreamProbe::Unsupported);
        }
        if status.is_success() {
            // Server-initiated messages are not consumed; dropping the
            // response closes the stream.
            return Ok(StreamProbe::Available);
        }
        Err(unexpected_status(response).await)
    }

    async fn close(&self) {
        let Some(session_id) = self.session_id.write().await.take() else {
            return;
        };

        let mut builder = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session_id.as_str());
        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        match builder.send().await {
            Ok(response) => {
                tracing::debug!(url = %self.url, status = %response.status(), "Session closed");
            }
            Err(e) => tracing::debug!(url = %self.url, error = %e, "Session close failed"),
        }
    }
}

async fn unexpected_status(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    TransportError::UnexpectedStatus { status, body }
}

/// Extract every JSON-RPC response carried in `data:` events of an SSE body.
///
/// Events that are not responses (server requests, notifications, comments)
/// are skipped.
pub fn parse_event_stream(body: &str) -> Vec<JsonRpcResponse> {
    let mut responses = Vec::new();
    let mut data = String::new();

    let mut flush = |data: &mut String| {
        if !data.is_empty() {
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(data) {
                if response.result.is_some() || response.error.is_some() {
                    responses.push(response);
                }
            }
            data.clear();
        }
    };

    for line in body.lines() {
        if line.is_empty() {
            flush(&mut data);
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    flush(&mut data);

    responses
}

// ============================================================================
// In-process
// ============================================================================

/// Transport bound to one session of an in-process `ProtocolServer`.
pub struct InProcessTransport {
    session: ProtocolSession,
}

impl InProcessTransport {
    pub const fn new(session: ProtocolSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(
        &self,
        request: JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>, TransportError> {
        if self.session.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(self.session.handle(request).await)
    }

    async fn probe_stream(&self) -> Result<StreamProbe, TransportError> {
        Ok(StreamProbe::Unsupported)
    }

    async fn close(&self) {
        self.session.close();
    }
}

/// Channel name to in-process server lookup.
///
/// Owned by the composition root and handed to the `Connector`; there is no
/// process-wide instance.
#[derive(Default)]
pub struct InProcessDirectory {
    servers: RwLock<HashMap<String, Arc<ProtocolServer>>>,
}

impl InProcessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server, replacing any previous one on the channel.
    pub async fn register(&self, channel: impl Into<String>, server: Arc<ProtocolServer>) {
        let channel = channel.into();
        tracing::debug!(channel = %channel, "Registered in-process server");
        self.servers.write().await.insert(channel, server);
    }

    pub async fn unregister(&self, channel: &str) -> bool {
        self.servers.write().await.remove(channel).is_some()
    }

    /// Open a fresh session on the server bound to `channel`.
    pub async fn open(&self, channel: &str) -> Result<InProcessTransport, TransportError> {
        let servers = self.servers.read().await;
        let server = servers
            .get(channel)
            .ok_or_else(|| TransportError::UnknownChannel(channel.to_string()))?;
        Ok(InProcessTransport::new(server.open_session()))
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Builds transports for server configurations.
#[derive(Clone)]
pub struct Connector {
    http: reqwest::Client,
    directory: Arc<InProcessDirectory>,
}

impl Connector {
    /// Create a connector whose HTTP requests time out after `request_timeout`.
    pub fn new(
        request_timeout: Duration,
        directory: Arc<InProcessDirectory>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { http, directory })
    }

    pub fn directory(&self) -> &Arc<InProcessDirectory> {
        &self.directory
    }

    /// Open a transport for `config`.
    pub async fn open(&self, config: &ServerConfig) -> Result<Arc<dyn Transport>, TransportError> {
        match &config.endpoint {
            Endpoint::Http { url } => Ok(Arc::new(HttpTransport::new(
                self.http.clone(),
                url.clone(),
                config.headers.clone(),
            ))),
            Endpoint::InProcess { channel } => Ok(Arc::new(self.directory.open(channel).await?)),
        }
    }
}
