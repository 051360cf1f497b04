//! # Memory Module
//!
//! Cross-run project state persisted as one JSON document per workspace.
//!
//! ```text
//! run start ──► MemoryStore::load_or_create ──► ProjectMemory
//!                                                   │ (read by Task-Selector)
//! run end   ◄── MemoryStore::save ◄── record_outcome ┘
//! ```

pub mod project_memory;
pub mod store;

pub use project_memory::{CompletedTask, ProjectMemory, RunOutcomeKind, BOOTSTRAP_TASK};
pub use store::MemoryStore;
