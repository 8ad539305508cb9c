//! Call command handler.

use anyhow::Result;
use serde_json::{Map, Value};
use toolweave_core::{ToolCall, ToolResult};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Parse `--args`; absent means no arguments.
pub fn parse_arguments(raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::Arguments(format!(
            "--args must be a JSON object, got {other}"
        ))),
        Err(e) => Err(CliError::Arguments(format!("--args is not valid JSON: {e}"))),
    }
}

/// Print the result content; a failed result becomes an error after any
/// partial content is shown.
pub fn report(result: &ToolResult) -> Result<(), CliError> {
    let text = result.text();
    if !text.is_empty() {
        println!("{text}");
    }
    if result.success {
        Ok(())
    } else {
        Err(CliError::ToolFailed(
            result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

pub async fn execute(
    ctx: &CliContext,
    server: String,
    tool: String,
    args: Option<&str>,
    retries: Option<u32>,
) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let call = ToolCall::new(server, tool).with_arguments(arguments);

    let retries = ctx.settings.retries_for(retries);
    let result = ctx.executor.execute_with_retry(call, retries).await;
    Ok(report(&result)?)
}
