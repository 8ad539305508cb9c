//! Common test utilities: an in-memory app and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use toolweave_axum::{AppState, CorsConfig, bootstrap, create_router};
use toolweave_core::Settings;

/// Bootstrap with default settings: no configured servers, no definitions.
pub async fn test_app() -> (Router, AppState) {
    test_app_with(Settings::default()).await
}

pub async fn test_app_with(settings: Settings) -> (Router, AppState) {
    let ctx = Arc::new(bootstrap(settings).await.unwrap());
    let app = create_router(Arc::clone(&ctx), &CorsConfig::AllowAll);
    (app, ctx)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

/// A minimal valid automation definition.
pub fn definition_json(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "description": format!("{name} tool"),
        "version": "1.0.0",
        "parameters": [{ "name": "query", "type": "string", "required": true }],
        "steps": [
            { "action": "navigate", "url": "https://shop.example/search?q={{query}}" },
            { "action": "extract", "name": "results", "selector": ".product",
              "fields": [{ "key": "title" }] }
        ]
    })
}
