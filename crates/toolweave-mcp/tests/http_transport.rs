//! Streamable HTTP transport against a local fake tool server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Map, Value, json};
use toolweave_core::{NoopEmitter, ServerConfig, ServerStatus};
use toolweave_mcp::{
    ConnectionError, Connector, HttpTransport, InProcessDirectory, ServerRegistry,
    ToolServerConnection,
};

#[derive(Clone)]
struct FakeServer {
    probe_status: StatusCode,
    fail_listing: bool,
    seen: Arc<Mutex<Vec<(String, Option<String>, Option<String>)>>>,
    deletes: Arc<AtomicUsize>,
}

impl FakeServer {
    fn new(probe_status: StatusCode) -> Self {
        Self {
            probe_status,
            fail_listing: false,
            seen: Arc::new(Mutex::new(Vec::new())),
            deletes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Announce tools on `initialize` but reject `tools/list`.
    fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_post(
    State(fake): State<FakeServer>,
    headers: HeaderMap,
    axum::Json(message): axum::Json<Value>,
) -> Response {
    let method = message["method"].as_str().unwrap_or_default().to_string();
    fake.seen.lock().unwrap().push((
        method.clone(),
        header_value(&headers, "mcp-session-id"),
        header_value(&headers, "authorization"),
    ));

    let Some(id) = message.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    match method.as_str() {
        "initialize" => (
            [("mcp-session-id", "session-42")],
            axum::Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake", "version": "0.1.0" }
                }
            })),
        )
            .into_response(),
        "tools/list" if fake.fail_listing => axum::Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32603, "message": "tool catalog unavailable" }
        }))
        .into_response(),
        "tools/list" => {
            let response = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": [
                    { "name": "forecast", "description": "Weather forecast",
                      "inputSchema": { "type": "object", "properties": { "city": { "type": "string" } } } }
                ] }
            });
            let body = format!(": ping\n\nevent: message\ndata: {response}\n\n");
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        "tools/call" => {
            let city = message["params"]["arguments"]["city"]
                .as_str()
                .unwrap_or("nowhere")
                .to_string();
            axum::Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": format!("Sunny in {city}") }] }
            }))
            .into_response()
        }
        other => axum::Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("Method not found: {other}") }
        }))
        .into_response(),
    }
}

async fn handle_get(State(fake): State<FakeServer>) -> StatusCode {
    fake.probe_status
}

async fn handle_delete(State(fake): State<FakeServer>) -> StatusCode {
    fake.deletes.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn spawn(fake: FakeServer) -> SocketAddr {
    let app = Router::new()
        .route(
            "/mcp",
            post(handle_post).get(handle_get).delete(handle_delete),
        )
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_full_session_over_http() {
    let fake = FakeServer::new(StatusCode::METHOD_NOT_ALLOWED);
    let addr = spawn(fake.clone()).await;

    let config = ServerConfig::http("weather", "Weather", format!("http://{addr}/mcp"))
        .with_header("Authorization", "Bearer secret");
    let transport = Arc::new(HttpTransport::new(
        client(),
        format!("http://{addr}/mcp"),
        config.headers.clone(),
    ));
    let connection = ToolServerConnection::new("weather", transport.clone());

    let init = connection.connect().await.unwrap();
    assert_eq!(init.server_info.name, "fake");
    assert!(!connection.is_streaming().await);
    assert_eq!(transport.session_id().await.as_deref(), Some("session-42"));

    let tools = connection.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "forecast");
    assert_eq!(tools[0].server_id, "weather");

    let mut args = Map::new();
    args.insert("city".to_string(), json!("Lisbon"));
    let result = connection.call_tool("forecast", args).await;
    assert!(result.success);
    assert_eq!(result.text(), "Sunny in Lisbon");

    connection.disconnect().await;
    connection.disconnect().await;
    assert_eq!(fake.deletes.load(Ordering::SeqCst), 1);

    let seen = fake.seen.lock().unwrap().clone();
    let methods: Vec<&str> = seen.iter().map(|(m, _, _)| m.as_str()).collect();
    assert_eq!(
        methods,
        vec!["initialize", "notifications/initialized", "tools/list", "tools/call"]
    );
    // The session id is replayed after initialize, static headers always.
    assert_eq!(seen[0].1, None);
    assert!(seen[1..].iter().all(|(_, s, _)| s.as_deref() == Some("session-42")));
    assert!(
        seen.iter()
            .all(|(_, _, auth)| auth.as_deref() == Some("Bearer secret"))
    );
}

#[tokio::test]
async fn test_probe_failure_other_than_405_fails_connect() {
    let fake = FakeServer::new(StatusCode::INTERNAL_SERVER_ERROR);
    let addr = spawn(fake.clone()).await;

    let transport = Arc::new(HttpTransport::new(
        client(),
        format!("http://{addr}/mcp"),
        Default::default(),
    ));
    let connection = ToolServerConnection::new("flaky", transport);

    let err = connection.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::UnexpectedStatus { status: 500, .. }));
    assert!(err.is_definitive());
    // The half-open session is released.
    assert_eq!(fake.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registry_over_http() {
    let fake = FakeServer::new(StatusCode::METHOD_NOT_ALLOWED);
    let addr = spawn(fake).await;

    let connector =
        Connector::new(Duration::from_secs(5), Arc::new(InProcessDirectory::new())).unwrap();
    let registry = ServerRegistry::new(connector, Arc::new(NoopEmitter::new()));

    let state = registry
        .add_server(ServerConfig::http(
            "weather",
            "Weather",
            format!("http://{addr}/mcp"),
        ))
        .await;
    assert_eq!(state.status, ServerStatus::Connected);
    assert_eq!(state.tools.len(), 1);
    assert!(state.last_connected_at.is_some());

    let result = registry
        .call_tool("weather", "forecast", Map::new())
        .await;
    assert_eq!(result.text(), "Sunny in nowhere");
}

#[tokio::test]
async fn test_discovery_failure_leaves_server_in_error() {
    let fake = FakeServer::new(StatusCode::METHOD_NOT_ALLOWED).failing_listing();
    let addr = spawn(fake.clone()).await;

    let connector =
        Connector::new(Duration::from_secs(5), Arc::new(InProcessDirectory::new())).unwrap();
    let registry = ServerRegistry::new(connector, Arc::new(NoopEmitter::new()));

    let state = registry
        .add_server(ServerConfig::http(
            "catalog",
            "Catalog",
            format!("http://{addr}/mcp"),
        ))
        .await;
    assert_eq!(state.status, ServerStatus::Error);
    assert!(state.tools.is_empty());
    let error = state.error.as_deref().unwrap_or_default();
    assert!(error.contains("tool catalog unavailable"), "{error}");

    // Still registered for inspection, but contributes no tools.
    let stored = registry.get_state("catalog").await.unwrap();
    assert_eq!(stored.status, ServerStatus::Error);
    assert!(registry.get_all_tools().await.is_empty());

    // The half-open session is released.
    assert_eq!(fake.deletes.load(Ordering::SeqCst), 1);
}
