//! Queue-backed command channel.
//!
//! Commands are pushed onto an mpsc queue together with a reply sender; the
//! other end (a websocket controller, a test fake) drains the queue and
//! answers each command through its sender.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{BridgeError, BridgeReply, CommandChannel, CommandEnvelope};

/// A command waiting for the controller's answer.
#[derive(Debug)]
pub struct PendingCommand {
    pub envelope: CommandEnvelope,
    pub reply: oneshot::Sender<BridgeReply>,
}

/// `CommandChannel` over a bounded mpsc queue.
#[derive(Debug, Clone)]
pub struct ChannelCommandChannel {
    sender: mpsc::Sender<PendingCommand>,
}

impl ChannelCommandChannel {
    /// Create the channel and the receiving end for the controller.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingCommand>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    /// Whether the controller end is still attached.
    pub fn is_attached(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[async_trait]
impl CommandChannel for ChannelCommandChannel {
    async fn dispatch(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<oneshot::Receiver<BridgeReply>, BridgeError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(PendingCommand { envelope, reply })
            .await
            .map_err(|_| BridgeError::Delivery("browser controller is not attached".to_string()))?;
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn test_detached_controller_fails_delivery() {
        let (channel, receiver) = ChannelCommandChannel::new(4);
        assert!(channel.is_attached());
        drop(receiver);
        assert!(!channel.is_attached());

        let err = channel
            .dispatch(CommandEnvelope::new("open", Map::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_reply_reaches_dispatcher() {
        let (channel, mut receiver) = ChannelCommandChannel::new(4);
        let pending_reply = channel
            .dispatch(CommandEnvelope::new("exists", Map::new()))
            .await
            .unwrap();

        let pending = receiver.recv().await.unwrap();
        assert_eq!(pending.envelope.action, "exists");
        pending
            .reply
            .send(BridgeReply::ok(serde_json::json!(true)))
            .unwrap();

        assert_eq!(
            pending_reply.await.unwrap(),
            BridgeReply::ok(serde_json::json!(true))
        );
    }
}
