//! Tools command handler.

use anyhow::Result;
use toolweave_core::ServerState;

use crate::bootstrap::CliContext;

/// Render server states and their tools as plain text.
pub fn render(states: &[ServerState]) -> String {
    if states.is_empty() {
        return "No servers configured.\n".to_string();
    }

    let mut out = String::new();
    for state in states {
        out.push_str(&format!("{} [{}]\n", state.id(), state.status));
        if let Some(error) = &state.error {
            out.push_str(&format!("  error: {error}\n"));
        }
        for tool in &state.tools {
            match &tool.description {
                Some(description) => {
                    out.push_str(&format!("  {:<24} {description}\n", tool.name));
                }
                None => out.push_str(&format!("  {}\n", tool.name)),
            }
        }
    }
    out
}

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let states = ctx.registry.list_states().await;
    print!("{}", render(&states));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolweave_core::{ServerConfig, ServerStatus, ToolInfo};

    #[test]
    fn test_render_lists_tools_under_their_server() {
        let mut state = ServerState::new(ServerConfig::http(
            "files",
            "Files",
            "http://localhost:3001/mcp",
        ));
        state.status = ServerStatus::Connected;
        state.tools = vec![
            ToolInfo::new("read_file", "files").with_description("Read a file"),
            ToolInfo::new("list_dir", "files"),
        ];

        let text = render(&[state]);
        assert!(text.starts_with("files [connected]\n"));
        assert!(text.contains("  read_file"));
        assert!(text.contains("Read a file"));
        assert!(text.contains("  list_dir\n"));
    }

    #[test]
    fn test_render_shows_errors() {
        let mut state = ServerState::new(ServerConfig::http(
            "offline",
            "Offline",
            "http://127.0.0.1:1/mcp",
        ));
        state.status = ServerStatus::Error;
        state.error = Some("connection refused".to_string());

        let text = render(&[state]);
        assert!(text.contains("offline [error]"));
        assert!(text.contains("error: connection refused"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No servers configured.\n");
    }
}
