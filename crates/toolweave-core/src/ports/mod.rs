//! Port definitions shared across crates.
//!
//! Ports keep channel types and infrastructure details out of the public
//! API of the services that use them.

mod event_emitter;
mod routing;

pub use event_emitter::{AppEventEmitter, BroadcastEmitter, DEFAULT_EVENT_CAPACITY, NoopEmitter};
pub use routing::RoutingError;
