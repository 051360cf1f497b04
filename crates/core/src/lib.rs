//! # Autopilot Core
//!
//! Multi-agent task orchestration: pick a task, plan it, fan it out to a
//! bounded pool of code-writing agents, gate the result through review,
//! apply the surviving patches, commit, and remember what happened.
//!
//! ## Architecture
//!
//! - `agents/` - One wrapper per agent: prompt template + one generation call
//! - `decode` - Shared response decoder (fences, sentinels, JSON, diffs)
//! - `domain/` - Task, plan, review and patch types
//! - `memory/` - Cross-run project memory (JSON file)
//! - `swarm/` - Orchestrator, worker pool, message bus, run state machine
//! - `tools/` - Workspace scanner, diff applier, git committer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autopilot_core::config::OrchestratorConfig;
//! use autopilot_core::swarm::{Collaborators, MessageBus, Orchestrator};
//! use std::sync::Arc;
//!
//! let config = OrchestratorConfig::load(root)?;
//! let collaborators = Collaborators::production(&config);
//! let orchestrator = Orchestrator::new(config, collaborators, Arc::new(MessageBus::new()));
//! let report = orchestrator.run_once(root).await;
//! ```

pub mod agents;
pub mod config;
pub mod decode;
pub mod domain;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod swarm;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
