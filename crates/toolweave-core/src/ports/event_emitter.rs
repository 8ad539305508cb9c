//! Event emitter trait for cross-crate event broadcasting.
//!
//! This module defines the abstraction for emitting application events.
//! Implementations handle transport details (channels, SSE, etc.).

use tokio::sync::broadcast;
use tracing::debug;

use crate::events::AppEvent;

/// Trait for emitting application events.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and CLI contexts that don't need events
/// - `BroadcastEmitter` - Fan-out to any number of stream subscribers
pub trait AppEventEmitter: Send + Sync {
    /// Emit an application event. Must not block.
    fn emit(&self, event: AppEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn AppEventEmitter>;
}

/// A no-op event emitter for tests and CLI contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Broadcast channel capacity used by [`BroadcastEmitter::with_defaults`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Emitter backed by a `tokio::sync::broadcast` channel.
///
/// Each subscriber gets its own receiver; slow subscribers may lag and miss
/// events but never block emitters.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    sender: broadcast::Sender<AppEvent>,
}

impl BroadcastEmitter {
    /// Create an emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create an emitter with the default capacity.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AppEventEmitter for BroadcastEmitter {
    fn emit(&self, event: AppEvent) {
        // Only log if there are receivers (avoid spam when nobody listens)
        if self.sender.receiver_count() > 0 {
            debug!(event = event.event_name(), "Broadcasting event");
            let _ = self.sender.send(event);
        }
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn AppEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(AppEvent::server_removed("a"));
        let _boxed = emitter.clone_box();
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let emitter = BroadcastEmitter::new(8);
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);

        emitter.emit(AppEvent::definition_removed("search"));

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                AppEvent::DefinitionRemoved { name } => assert_eq!(name, "search"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let emitter = BroadcastEmitter::with_defaults();
        emitter.emit(AppEvent::server_removed("a"));
        assert_eq!(emitter.subscriber_count(), 0);
    }
}
