//! WebSocket upgrade handler for the browser controller.
//!
//! `GET /bridge` attaches the connecting browser extension as the controller
//! that executes automation commands.
//!
//! | Direction | Frame | Content |
//! |---|---|---|
//! | Server → Client | Text | `CommandEnvelope` JSON |
//! | Client → Server | Text | `ReplyEnvelope` JSON (`{id, success, data?, error?}`) |
//!
//! Two tasks run per connection: ingest (replies → pending commands) and
//! egress (command queue → socket). When either ends the other is aborted
//! and the controller is detached.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use toolweave_automation::ReplyEnvelope;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// `GET /bridge`
pub async fn connect(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_controller(socket, state))
}

async fn handle_controller(socket: WebSocket, state: AppState) {
    let (generation, mut outbound) = state.controller.attach();
    info!(generation, "Browser controller connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let controller = Arc::clone(&state.controller);
    let mut ingest = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ReplyEnvelope>(text.as_str()) {
                        Ok(reply) => {
                            controller.resolve(reply);
                        }
                        Err(e) => warn!(error = %e, "Unparseable controller message"),
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                // Ping/pong and binary frames carry nothing for us.
                Ok(_) => {}
            }
        }
    });

    let mut egress = tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize command");
                    continue;
                }
            };
            debug!(id = %envelope.id, action = %envelope.action, "Forwarding command");
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    state.controller.detach(generation);
    info!(generation, "Browser controller disconnected");
}
