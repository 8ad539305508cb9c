#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod bridge;
pub mod dynamic;
pub mod engine;
pub mod template;

pub use bridge::{
    BridgeError, BridgePool, BridgeReply, ChannelCommandChannel, CommandChannel, CommandEnvelope,
    DEFAULT_COMMAND_TIMEOUT, PendingCommand, RemoteActionBridge, ReplyEnvelope, TabId,
};
pub use dynamic::{AUTOMATION_SERVER_ID, DynamicToolRegistry, LoadError};
pub use engine::{AutomationEngine, MAIN_ABORTED, StepError, coerce};

#[cfg(test)]
use tempfile as _;
