//! # Swarm Orchestration
//!
//! Coordinates the agent pipeline for one workspace.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Memory → TaskSelector → Architect → [5 workers, bounded pool] → Reviewer
//!        → Documentation → apply patches → DevOps → commit → Memory
//! ```

pub mod bus;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;

pub use bus::{BusReceiver, Message, MessageBus};
pub use events::{EventSink, SwarmEvent, SwarmEventKind};
pub use orchestrator::{
    ApprovalRequest, ApprovalResponse, ApprovalSender, Collaborators, ContinuousReport,
    Orchestrator, PatchSummary, RunOutcome, RunReport, StopReason,
};
pub use pipeline::{Pipeline, RunState};
pub use pool::{PoolError, WorkerPool};
