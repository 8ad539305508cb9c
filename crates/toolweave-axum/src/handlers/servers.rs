//! Tool server management.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use toolweave_automation::AUTOMATION_SERVER_ID;
use toolweave_core::{ServerConfig, ServerState};

use crate::error::HttpError;
use crate::state::AppState;

/// List all servers with their state.
pub async fn list(State(state): State<AppState>) -> Json<Vec<ServerState>> {
    Json(state.registry.list_states().await)
}

/// Get one server.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerState>, HttpError> {
    state
        .registry
        .get_state(&id)
        .await
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("Server {id}")))
}

/// Add (or replace) a server and connect to it.
///
/// The response carries the state after the connection attempt; a server
/// that could not be reached is still registered, in `error` status.
pub async fn add(
    State(state): State<AppState>,
    Json(config): Json<ServerConfig>,
) -> Result<Json<ServerState>, HttpError> {
    if config.id == AUTOMATION_SERVER_ID {
        return Err(HttpError::BadRequest(format!(
            "Server id '{AUTOMATION_SERVER_ID}' is reserved"
        )));
    }
    config.validate().map_err(HttpError::BadRequest)?;
    Ok(Json(state.registry.add_server(config).await))
}

/// Remove a server.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    if id == AUTOMATION_SERVER_ID {
        return Err(HttpError::BadRequest(
            "The automation server cannot be removed".to_string(),
        ));
    }
    if state.registry.get_state(&id).await.is_none() {
        return Err(HttpError::NotFound(format!("Server {id}")));
    }
    state.registry.remove_server(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Reconnect a server and rediscover its tools.
pub async fn reconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerState>, HttpError> {
    state
        .registry
        .reconnect(&id)
        .await
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("Server {id}")))
}
