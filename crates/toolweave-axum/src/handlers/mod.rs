//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for a specific API area.
//! Handlers are thin wrappers over the shared `AxumContext`.

pub mod bridge;
pub mod definitions;
pub mod events;
pub mod mcp;
pub mod servers;
pub mod tools;
