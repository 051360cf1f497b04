//! # Swarm Events
//!
//! Observational events for the UI sink. Nothing in the orchestrator reads
//! them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

/// Kind of swarm event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    /// A single run started
    RunStarted,
    /// The run moved to a new state
    StateChanged,
    /// Agent started working
    AgentStarted,
    /// Agent completed (with or without a change)
    AgentCompleted,
    /// Agent failed
    AgentFailed,
    /// A message was published on the bus
    MessagePosted,
    /// Review verdict is in; data says whether a human is needed
    ReviewGate,
    /// A patch was applied (possibly with skipped files)
    PatchApplied,
    /// A patch could not be applied at all
    PatchSkipped,
    /// Run finished without a fatal error
    RunCompleted,
    /// Run ended in the error state
    RunFailed,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: SwarmEventKind,
    /// Agent (or "orchestrator") that produced this event
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SwarmEvent {
    pub fn new(kind: SwarmEventKind, agent: &str) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Optional event channel. Cloned into every worker task.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SwarmEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<SwarmEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub async fn emit(&self, event: SwarmEvent) {
        if let Some(tx) = &self.tx {
            // A closed UI must never affect the run
            let _ = tx.send(event).await;
        }
    }
}

/// Short unique id for events and runs
pub fn new_id() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let millis = Utc::now().timestamp_millis();
    format!("{:x}-{:04x}", millis, SEQ.fetch_add(1, Ordering::Relaxed) & 0xffff)
}
