//! Domain types.
//!
//! - `server` - Server configuration and runtime state
//! - `tool` - Tool metadata, calls and results (shared by every backend)
//! - `automation` - Declarative browser-automation definitions
//! - `run` - Automation run results and logs

mod automation;
mod run;
mod server;
mod tool;

pub use automation::{
    Action, ActionStep, ExtractField, ExtractMode, Lane, MAIN_LANE, ParamType, ParameterDef,
    ScrollDirection, ToolDefinition, ValueType,
};
pub use run::{RunnerResult, StepLog, StepStatus};
pub use server::{Endpoint, ServerConfig, ServerOrigin, ServerState, ServerStatus};
pub use tool::{ContentItem, ToolCall, ToolInfo, ToolResult};
