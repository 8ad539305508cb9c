//! Automation definition management.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use toolweave_core::{ToolDefinition, definitions_from_value};

use crate::error::HttpError;
use crate::state::AppState;

/// List loaded definitions.
pub async fn list(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.automation.get_loaded_definitions().await)
}

/// Get one definition.
pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ToolDefinition>, HttpError> {
    state
        .automation
        .get_definition(&name)
        .await
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("Definition {name}")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub loaded: Vec<String>,
    /// The automation server was re-added to announce new tools.
    pub restarted: bool,
}

/// Load one definition object or an array of them, all-or-nothing.
pub async fn load(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<LoadResponse>, HttpError> {
    let defs = definitions_from_value(body)?;
    let loaded = defs.iter().map(|def| def.name.clone()).collect();
    let restarted = state.load_definitions(defs).await?;
    Ok(Json(LoadResponse { loaded, restarted }))
}

/// Remove a definition.
pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, HttpError> {
    if state.remove_definition(&name).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HttpError::NotFound(format!("Definition {name}")))
    }
}
