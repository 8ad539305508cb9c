//! The `/mcp` protocol endpoint: session lifecycle and tool discovery.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};

use common::{TestResponse, definition_json, get, post_json, send, test_app};

const SESSION: &str = "mcp-session-id";

fn rpc(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

async fn post_in_session(app: &axum::Router, session: &str, body: &Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("content-type", "application/json")
            .header(SESSION, session)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn initialize(app: &axum::Router) -> String {
    let response = post_json(app, "/mcp", &rpc(1, "initialize", json!({}))).await;
    assert_eq!(response.status, StatusCode::OK);
    response.headers[SESSION].to_str().unwrap().to_string()
}

#[tokio::test]
async fn initialize_opens_a_session() {
    let (app, ctx) = test_app().await;
    post_json(&app, "/api/definitions", &definition_json("search")).await;
    let before = ctx.protocol.live_sessions();

    let response = post_json(&app, "/mcp", &rpc(1, "initialize", json!({}))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key(SESSION));
    assert_eq!(response.body["id"], 1);
    assert_eq!(response.body["result"]["serverInfo"]["name"], "toolweave-automation");
    assert!(response.body["result"]["capabilities"]["tools"].is_object());

    assert_eq!(ctx.protocol.live_sessions(), before + 1);
    assert_eq!(ctx.sessions.len().await, 1);
}

#[tokio::test]
async fn session_lists_loaded_tools() {
    let (app, _ctx) = test_app().await;
    post_json(&app, "/api/definitions", &definition_json("search")).await;
    let session = initialize(&app).await;

    let notified = post_in_session(
        &app,
        &session,
        &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(notified.status, StatusCode::ACCEPTED);

    let response = post_in_session(&app, &session, &rpc(2, "tools/list", json!({}))).await;
    assert_eq!(response.status, StatusCode::OK);
    let tools = response.body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "search");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["query"]));
}

#[tokio::test]
async fn requests_outside_a_session_are_rejected() {
    let (app, _ctx) = test_app().await;

    let response = post_json(&app, "/mcp", &rpc(1, "tools/list", json!({}))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], -32600);

    let response = post_in_session(&app, "stale", &rpc(1, "tools/list", json!({}))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unparseable_body_is_a_parse_error() {
    let (app, _ctx) = test_app().await;

    let response = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], -32700);
}

#[tokio::test]
async fn delete_closes_the_session() {
    let (app, ctx) = test_app().await;
    let session = initialize(&app).await;
    let live = ctx.protocol.live_sessions();

    let close = |id: &str| {
        Request::builder()
            .method(Method::DELETE)
            .uri("/mcp")
            .header(SESSION, id)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, close(&session)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, close(&session)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.protocol.live_sessions(), live - 1);

    let response = post_in_session(&app, &session, &rpc(2, "ping", json!({}))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn server_initiated_stream_is_not_offered() {
    let (app, _ctx) = test_app().await;
    assert_eq!(
        get(&app, "/mcp").await.status,
        StatusCode::METHOD_NOT_ALLOWED
    );
}
