//! Common test utilities.
//!
//! A scripted browser controller that records every command it receives.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use toolweave_automation::{BridgeReply, ChannelCommandChannel, CommandEnvelope};

/// Commands seen by the fake controller, in arrival order.
pub type CommandLog = Arc<Mutex<Vec<CommandEnvelope>>>;

/// Reply for `envelope`, or `None` to never answer.
pub type Script = Box<dyn Fn(&CommandEnvelope) -> Option<BridgeReply> + Send>;

/// Spawn a controller driven by `script`.
pub fn spawn_browser(script: Script) -> (Arc<ChannelCommandChannel>, CommandLog) {
    let (channel, mut commands) = ChannelCommandChannel::new(32);
    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);

    tokio::spawn(async move {
        // Unanswered commands keep their reply sender alive so the caller
        // times out instead of seeing a closed channel.
        let mut unanswered = Vec::new();
        while let Some(pending) = commands.recv().await {
            seen.lock().unwrap().push(pending.envelope.clone());
            match script(&pending.envelope) {
                Some(reply) => {
                    let _ = pending.reply.send(reply);
                }
                None => unanswered.push(pending.reply),
            }
        }
    });

    (Arc::new(channel), log)
}

/// A well-behaved page: one tab per lane, a product list, a title.
pub fn standard_reply(envelope: &CommandEnvelope) -> BridgeReply {
    let lane = envelope.payload.get("laneId").and_then(Value::as_str);
    match envelope.action.as_str() {
        "open" => {
            let tab_id = if lane == Some("main") { 1 } else { 2 };
            BridgeReply::ok(json!({ "tabId": tab_id }))
        }
        "extractList" => BridgeReply::ok(json!([
            { "title": "Desk lamp", "price": "$24.99" },
            { "title": "Floor lamp", "price": "$89" }
        ])),
        "extractSingle" => BridgeReply::ok(json!({ "title": "Shop", "inStock": "yes" })),
        "click" if envelope.payload.get("selector") == Some(&json!("#missing")) => {
            BridgeReply::failed("element not found: #missing")
        }
        _ => BridgeReply::ok(Value::Null),
    }
}

pub fn standard_browser() -> (Arc<ChannelCommandChannel>, CommandLog) {
    spawn_browser(Box::new(|envelope| Some(standard_reply(envelope))))
}

/// Actions seen so far, in order.
pub fn actions(log: &CommandLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|envelope| envelope.action.clone())
        .collect()
}

/// Parse a definition from a JSON literal.
pub fn definition(value: Value) -> toolweave_core::ToolDefinition {
    serde_json::from_value(value).unwrap()
}
