//! Per-run set of lane bridges.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use super::{CommandChannel, RemoteActionBridge};

/// Hands out one bridge per lane for the duration of a run.
pub struct BridgePool {
    channel: Arc<dyn CommandChannel>,
    timeout: Duration,
    lanes: Mutex<HashMap<String, Arc<RemoteActionBridge>>>,
}

impl BridgePool {
    pub fn new(channel: Arc<dyn CommandChannel>, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// The bridge for `lane_id`, created on first use.
    pub async fn lane(&self, lane_id: &str) -> Arc<RemoteActionBridge> {
        let mut lanes = self.lanes.lock().await;
        Arc::clone(lanes.entry(lane_id.to_string()).or_insert_with(|| {
            Arc::new(RemoteActionBridge::new(
                Arc::clone(&self.channel),
                lane_id,
                self.timeout,
            ))
        }))
    }

    /// Close every tab opened through this pool. Failures are logged only.
    pub async fn close_all(&self) {
        let bridges: Vec<_> = self.lanes.lock().await.drain().map(|(_, b)| b).collect();
        let results = join_all(bridges.iter().map(|bridge| bridge.close())).await;
        for (bridge, result) in bridges.iter().zip(results) {
            if let Err(e) = result {
                tracing::debug!(lane = bridge.lane_id(), error = %e, "Failed to close tab");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeReply, ChannelCommandChannel};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lanes_are_reused_and_closed() {
        let (channel, mut commands) = ChannelCommandChannel::new(8);
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        tokio::spawn(async move {
            let mut next_tab = 1;
            while let Some(pending) = commands.recv().await {
                let reply = match pending.envelope.action.as_str() {
                    "open" => {
                        next_tab += 1;
                        BridgeReply::ok(json!(next_tab))
                    }
                    "close" => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        BridgeReply::ok(json!(null))
                    }
                    _ => BridgeReply::ok(json!(null)),
                };
                let _ = pending.reply.send(reply);
            }
        });

        let pool = BridgePool::new(Arc::new(channel), Duration::from_secs(5));
        let main = pool.lane("main").await;
        assert!(Arc::ptr_eq(&main, &pool.lane("main").await));

        main.open("https://a.example", false).await.unwrap();
        pool.lane("reviews")
            .await
            .open("https://b.example", true)
            .await
            .unwrap();
        // Never opened a tab, so nothing to close.
        pool.lane("idle").await;

        pool.close_all().await;
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert_eq!(main.tab_id().await, None);
    }
}
