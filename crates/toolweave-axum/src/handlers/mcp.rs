//! Tool protocol endpoint for external agents.
//!
//! `POST /mcp` carries one JSON-RPC message per request. A session starts with
//! an `initialize` request without a session header; the response carries the
//! `Mcp-Session-Id` to send with every later message. Server-initiated
//! streaming is not offered, so `GET /mcp` answers 405.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use toolweave_mcp::protocol::{INVALID_REQUEST, PARSE_ERROR};
use toolweave_mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, SESSION_HEADER};

use crate::state::AppState;

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn rpc_error(status: StatusCode, code: i64, message: impl Into<String>) -> Response {
    (
        status,
        Json(JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(code, message),
        )),
    )
        .into_response()
}

/// `POST /mcp`
pub async fn post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return rpc_error(StatusCode::BAD_REQUEST, PARSE_ERROR, e.to_string()),
    };

    let session = match session_header(&headers) {
        Some(id) => match state.sessions.get(id).await {
            Some(session) => session,
            None => return (StatusCode::NOT_FOUND, "Unknown session").into_response(),
        },
        None if request.method == "initialize" => {
            let session = Arc::new(state.protocol.open_session());
            state.sessions.insert(Arc::clone(&session)).await;
            tracing::debug!(session = %session.id(), "Opened protocol session");
            session
        }
        None => {
            return rpc_error(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                format!("Missing {SESSION_HEADER} header"),
            );
        }
    };

    match session.handle(request).await {
        Some(response) => (
            [(SESSION_HEADER, session.id().to_string())],
            Json(response),
        )
            .into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `GET /mcp`
pub async fn get() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

/// `DELETE /mcp`
pub async fn delete(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    match session_header(&headers) {
        Some(id) if state.sessions.remove(id).await => StatusCode::NO_CONTENT,
        Some(_) => StatusCode::NOT_FOUND,
        None => StatusCode::BAD_REQUEST,
    }
}
