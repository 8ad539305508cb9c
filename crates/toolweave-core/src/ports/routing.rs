//! Routing failures.
//!
//! These never cross into caller control flow as errors: the registry and the
//! dynamic tool registry render them into failed `ToolResult`s.

use thiserror::Error;

use crate::domain::ToolResult;

/// A tool call could not be routed to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No server is registered under this id.
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// The server exists but is not connected.
    #[error("Server '{server_id}' is not connected (status: {status})")]
    NotConnected { server_id: String, status: String },

    /// The backend does not know this tool.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl From<RoutingError> for ToolResult {
    fn from(error: RoutingError) -> Self {
        Self::error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_error_becomes_failed_result() {
        let result: ToolResult = RoutingError::UnknownServer("nope".to_string()).into();
        assert!(!result.success);
        assert!(result.content.is_empty());
        assert_eq!(result.error.as_deref(), Some("Unknown server: nope"));
    }
}
