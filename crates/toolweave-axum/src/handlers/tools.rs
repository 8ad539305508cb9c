//! Tool listing and invocation across all connected servers.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Map, Value};
use toolweave_core::{ToolCall, ToolInfo, ToolResult};

use crate::state::AppState;

/// List tools of every connected server.
pub async fn list(State(state): State<AppState>) -> Json<Vec<ToolInfo>> {
    Json(state.registry.get_all_tools().await)
}

/// Request body for `POST /api/tools/call`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolRequest {
    pub server_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Retries after a failed attempt; the configured default when omitted.
    /// Capped at `MAX_RETRIES_LIMIT`.
    #[serde(default)]
    pub retries: Option<u32>,
}

/// Call a tool. Failures are reported in the body, never as an HTTP error.
pub async fn call(
    State(state): State<AppState>,
    Json(req): Json<CallToolRequest>,
) -> Json<ToolResult> {
    let call = ToolCall::new(req.server_id, req.tool_name).with_arguments(req.arguments);
    let retries = state.settings.retries_for(req.retries);
    Json(state.executor.execute_with_retry(call, retries).await)
}
