//! Browser controller channel over a WebSocket.
//!
//! The browser extension connects to `GET /bridge` and becomes the single
//! attached controller. Commands are pushed to it as text frames; replies
//! come back as `ReplyEnvelope`s and are matched to the waiting command by id.
//! A newer connection replaces the older one; commands still pending on the
//! replaced connection fail as closed.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use toolweave_automation::{BridgeError, BridgeReply, CommandChannel, CommandEnvelope, ReplyEnvelope};

/// Commands buffered per controller connection.
const OUTBOUND_BUFFER: usize = 64;

struct Attached {
    generation: u64,
    outbound: mpsc::Sender<CommandEnvelope>,
}

#[derive(Default)]
struct ControllerState {
    attached: Option<Attached>,
    next_generation: u64,
    pending: HashMap<String, oneshot::Sender<BridgeReply>>,
}

/// `CommandChannel` backed by the currently attached WebSocket controller.
#[derive(Default)]
pub struct WsControllerChannel {
    state: Mutex<ControllerState>,
}

impl WsControllerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Attach a new controller connection.
    ///
    /// Returns the connection's generation (for `detach`) and the queue of
    /// commands to forward to it.
    pub fn attach(&self) -> (u64, mpsc::Receiver<CommandEnvelope>) {
        let (outbound, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        if state.attached.is_some() {
            tracing::info!(generation, "Browser controller replaced");
            state.pending.clear();
        }
        state.attached = Some(Attached {
            generation,
            outbound,
        });
        (generation, receiver)
    }

    /// Detach the connection with `generation` if it is still the current
    /// one. Pending commands fail as closed.
    pub fn detach(&self, generation: u64) {
        let mut state = self.lock();
        if state
            .attached
            .as_ref()
            .is_some_and(|attached| attached.generation == generation)
        {
            state.attached = None;
            state.pending.clear();
            tracing::info!(generation, "Browser controller detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached.is_some()
    }

    /// Number of commands waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Route a reply to its command. Returns false for unknown ids (late
    /// replies after a timeout, or garbage).
    pub fn resolve(&self, reply: ReplyEnvelope) -> bool {
        let waiter = self.lock().pending.remove(&reply.id);
        match waiter {
            Some(waiter) => waiter.send(reply.reply).is_ok(),
            None => {
                tracing::debug!(id = %reply.id, "Reply for unknown command");
                false
            }
        }
    }
}

#[async_trait]
impl CommandChannel for WsControllerChannel {
    async fn dispatch(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<oneshot::Receiver<BridgeReply>, BridgeError> {
        let id = envelope.id.clone();
        let (reply, receiver) = oneshot::channel();

        let outbound = {
            let mut state = self.lock();
            let Some(attached) = &state.attached else {
                return Err(BridgeError::Delivery(
                    "no browser controller connected".to_string(),
                ));
            };
            let outbound = attached.outbound.clone();
            state.pending.insert(id.clone(), reply);
            outbound
        };

        if outbound.send(envelope).await.is_err() {
            self.lock().pending.remove(&id);
            return Err(BridgeError::Delivery(
                "browser controller connection closed".to_string(),
            ));
        }
        Ok(receiver)
    }

    fn cancel(&self, id: &str) {
        self.lock().pending.remove(id);
    }
}
