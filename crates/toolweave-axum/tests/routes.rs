//! Integration tests for the management API.
//!
//! These tests verify that routes are correctly wired to handlers.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};
use toolweave_core::Settings;

use common::{definition_json, delete, get, post_json, test_app, test_app_with};

fn names(list: &Value, key: &str) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item.pointer(key).unwrap().as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let (app, _ctx) = test_app().await;

    for uri in ["/health", "/api/health"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!("OK"));
    }
}

#[tokio::test]
async fn automation_server_is_registered_at_startup() {
    let (app, _ctx) = test_app().await;

    let response = get(&app, "/api/servers").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(names(&response.body, "/config/id"), vec!["automation"]);
    assert_eq!(response.body[0]["status"], "connected");

    let response = get(&app, "/api/servers/automation").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["config"]["category"], "automation");
}

#[tokio::test]
async fn unknown_server_is_not_found() {
    let (app, _ctx) = test_app().await;

    let response = get(&app, "/api/servers/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["status"], 404);

    assert_eq!(
        delete(&app, "/api/servers/nope").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        post_json(&app, "/api/servers/nope/reconnect", &json!({}))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn adding_a_server_validates_the_config() {
    let (app, _ctx) = test_app().await;

    let bad_scheme = json!({
        "id": "files",
        "name": "Files",
        "endpoint": { "kind": "http", "url": "ftp://localhost/mcp" }
    });
    let response = post_json(&app, "/api/servers", &bad_scheme).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let reserved = json!({
        "id": "automation",
        "name": "Impostor",
        "endpoint": { "kind": "http", "url": "http://127.0.0.1:1/mcp" }
    });
    let response = post_json(&app, "/api/servers", &reserved).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = delete(&app, "/api/servers/automation").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_server_is_registered_in_error_state() {
    let (app, _ctx) = test_app().await;

    let config = json!({
        "id": "offline",
        "name": "Offline",
        "endpoint": { "kind": "http", "url": "http://127.0.0.1:1/mcp" }
    });
    let response = post_json(&app, "/api/servers", &config).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "error");
    assert!(response.body["error"].is_string());

    let response = get(&app, "/api/servers").await;
    assert_eq!(
        names(&response.body, "/config/id"),
        vec!["automation", "offline"]
    );

    assert_eq!(
        delete(&app, "/api/servers/offline").await.status,
        StatusCode::NO_CONTENT
    );
    let response = get(&app, "/api/servers").await;
    assert_eq!(names(&response.body, "/config/id"), vec!["automation"]);
}

#[tokio::test]
async fn loaded_definitions_become_tools() {
    let (app, _ctx) = test_app().await;

    let response = post_json(&app, "/api/definitions", &definition_json("search")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["loaded"], json!(["search"]));
    // The registry's own session was live, so the server was re-added.
    assert_eq!(response.body["restarted"], true);

    let response = get(&app, "/api/definitions").await;
    assert_eq!(names(&response.body, "/name"), vec!["search"]);

    let response = get(&app, "/api/definitions/search").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["version"], "1.0.0");

    let response = get(&app, "/api/tools").await;
    assert_eq!(names(&response.body, "/name"), vec!["search"]);
    assert_eq!(response.body[0]["serverId"], "automation");
}

#[tokio::test]
async fn removed_definition_disappears() {
    let (app, _ctx) = test_app().await;

    post_json(
        &app,
        "/api/definitions",
        &json!([definition_json("search"), definition_json("reviews")]),
    )
    .await;

    assert_eq!(
        delete(&app, "/api/definitions/search").await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        delete(&app, "/api/definitions/search").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(&app, "/api/definitions/search").await.status,
        StatusCode::NOT_FOUND
    );

    let response = get(&app, "/api/tools").await;
    assert_eq!(names(&response.body, "/name"), vec!["reviews"]);
}

#[tokio::test]
async fn invalid_definitions_are_rejected_as_a_batch() {
    let (app, _ctx) = test_app().await;

    let response = post_json(&app, "/api/definitions", &json!({ "name": "broken" })).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["type"], "INVALID_DEFINITION");

    let duplicate = json!([definition_json("search"), definition_json("search")]);
    let response = post_json(&app, "/api/definitions", &duplicate).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let issues = response.body["metadata"]["issues"].as_array().unwrap();
    assert!(
        issues
            .iter()
            .any(|issue| issue["message"] == "duplicate tool name in batch")
    );

    let response = get(&app, "/api/definitions").await;
    assert_eq!(response.body, json!([]));
}

#[tokio::test]
async fn tool_call_failures_are_reported_in_the_body() {
    let (app, _ctx) = test_app().await;

    let response = post_json(
        &app,
        "/api/tools/call",
        &json!({ "serverId": "nope", "toolName": "anything", "retries": 0 }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "Unknown server: nope");
    assert_eq!(response.body["call"]["serverId"], "nope");
}

#[tokio::test(start_paused = true)]
async fn requested_retries_are_capped() {
    let (app, _ctx) = test_app_with(Settings {
        retry_base_delay_ms: Some(1),
        ..Settings::default()
    })
    .await;

    let started = tokio::time::Instant::now();
    let response = tokio::time::timeout(
        Duration::from_secs(60),
        post_json(
            &app,
            "/api/tools/call",
            &json!({ "serverId": "nope", "toolName": "anything", "retries": u32::MAX }),
        ),
    )
    .await
    .expect("call should give up after the capped retries");
    assert_eq!(response.body["success"], false);

    // Ten retries: 1 + 2 + ... + 512 ms of backoff.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1023), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
}

#[tokio::test]
async fn automation_tool_fails_without_a_browser_controller() {
    let (app, ctx) = test_app().await;
    post_json(&app, "/api/definitions", &definition_json("search")).await;
    assert!(!ctx.controller.is_attached());

    let response = post_json(
        &app,
        "/api/tools/call",
        &json!({
            "serverId": "automation",
            "toolName": "search",
            "arguments": { "query": "lamps" },
            "retries": 0
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], false);
    let error = response.body["error"].as_str().unwrap();
    assert!(error.contains("no browser controller connected"), "{error}");
}

#[tokio::test]
async fn automation_tool_rejects_missing_arguments() {
    let (app, _ctx) = test_app().await;
    post_json(&app, "/api/definitions", &definition_json("search")).await;

    let response = post_json(
        &app,
        "/api/tools/call",
        &json!({ "serverId": "automation", "toolName": "search", "retries": 0 }),
    )
    .await;
    assert_eq!(response.body["success"], false);
    assert!(
        response.body["error"]
            .as_str()
            .unwrap()
            .contains("query")
    );
}
