//! SSE event broadcaster for real-time event streaming.
//!
//! The broadcaster is the `AppEventEmitter` handed to the registries at
//! bootstrap; every connected `/api/events` client receives every event.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use toolweave_core::{AppEvent, AppEventEmitter, BroadcastEmitter};

/// SSE broadcaster over a broadcast channel.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    inner: BroadcastEmitter,
}

impl SseBroadcaster {
    /// Create a broadcaster buffering at most `capacity` events per client.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BroadcastEmitter::new(capacity),
        }
    }

    /// Stream events to a new client as named SSE events, with a keep-alive
    /// ping every 30 seconds.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let stream = BroadcastStream::new(self.inner.subscribe()).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_name()).data(json))),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize event");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "SSE client lagged");
                None
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    /// Raw receiver, for in-process observers.
    pub fn receiver(&self) -> tokio::sync::broadcast::Receiver<AppEvent> {
        self.inner.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}

impl AppEventEmitter for SseBroadcaster {
    fn emit(&self, event: AppEvent) {
        self.inner.emit(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
