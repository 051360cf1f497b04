//! # Message Bus
//!
//! Agent-to-agent messages. One bus per orchestrator, passed to every agent
//! through its context. Messages addressed to `"all"` reach every
//! subscriber; anything else only reaches the subscriber of that name.
//! Each subscriber sees messages in publish order.

use super::events::{SwarmEvent, SwarmEventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Recipient that addresses every subscriber
pub const BROADCAST: &str = "all";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Message {
    pub fn new(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            data: None,
        }
    }

    pub fn broadcast(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(from, BROADCAST, text)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }

    pub fn is_for(&self, name: &str) -> bool {
        self.is_broadcast() || self.to == name
    }
}

pub struct MessageBus {
    sender: broadcast::Sender<Message>,
    events: Mutex<Option<mpsc::Sender<SwarmEvent>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events: Mutex::new(None),
        }
    }

    /// Also forward every published message to the UI sink as `MessagePosted`
    pub fn forward_to(&self, tx: mpsc::Sender<SwarmEvent>) {
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    pub fn subscribe(&self, name: impl Into<String>) -> BusReceiver {
        BusReceiver {
            name: name.into(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish a message. Returns how many subscribers were listening.
    pub fn publish(&self, message: Message) -> usize {
        tracing::debug!(from = %message.from, to = %message.to, "Bus message");

        if let Some(tx) = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            let event = SwarmEvent::new(SwarmEventKind::MessagePosted, &message.from).with_data(
                serde_json::json!({
                    "to": message.to,
                    "text": message.text,
                }),
            );
            // Publishing is synchronous; a full UI channel drops the event
            let _ = tx.try_send(event);
        }

        // No subscribers is not an error
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A named subscription that only yields messages addressed to it
pub struct BusReceiver {
    name: String,
    receiver: broadcast::Receiver<Message>,
}

impl BusReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next message for this subscriber, `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if msg.is_for(&self.name) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscriber = %self.name, skipped, "Bus subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published message for this subscriber, if any
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if msg.is_for(&self.name) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(subscriber = %self.name, skipped, "Bus subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
