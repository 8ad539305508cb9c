#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used by the integration tests only
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sessions;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, automation_server_config, bootstrap, start_server};
pub use controller::WsControllerChannel;
pub use error::HttpError;
pub use routes::create_router;
pub use sessions::SessionStore;
pub use sse::SseBroadcaster;
pub use state::AppState;
