#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;
pub mod validation;

// Re-export commonly used types for convenience
pub use domain::{
    Action, ActionStep, ContentItem, Endpoint, ExtractField, ExtractMode, Lane, MAIN_LANE,
    ParamType, ParameterDef, RunnerResult, ScrollDirection, ServerConfig, ServerOrigin,
    ServerState, ServerStatus, StepLog, StepStatus, ToolCall, ToolDefinition, ToolInfo,
    ToolResult, ValueType,
};
pub use events::AppEvent;
pub use ports::{
    AppEventEmitter, BroadcastEmitter, DEFAULT_EVENT_CAPACITY, NoopEmitter, RoutingError,
};
pub use settings::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_SESSIONS, DEFAULT_PORT,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SESSION_IDLE_TIMEOUT_SECS, MAX_RETRIES_LIMIT, Settings, SettingsError, default_settings_path, validate_settings,
};
pub use validation::{
    ValidationError, ValidationIssue, definitions_from_value, parse_definitions,
    prepare_arguments, validate_batch, validate_definition,
};

