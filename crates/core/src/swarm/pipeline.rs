//! # Run Pipeline
//!
//! The single-run state machine.
//!
//! ```text
//! Idle → LoadingMemory → SelectingTask ─(no task)─► Done
//!   → Planning → ParallelExecution → Reviewing ─(not approved, interactive)─► AwaitingHumanDecision
//!   → Documenting → ApplyingPatches → DevOpsSetup → Committing → UpdatingMemory → Done
//! ```
//!
//! A fatal failure from any state goes to `Error`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum RunState {
    Idle,
    LoadingMemory,
    SelectingTask,
    Planning,
    ParallelExecution,
    Reviewing,
    AwaitingHumanDecision,
    Documenting,
    ApplyingPatches,
    DevOpsSetup,
    Committing,
    UpdatingMemory,
    Done,
    Error(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Error(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::LoadingMemory => "loading_memory",
            RunState::SelectingTask => "selecting_task",
            RunState::Planning => "planning",
            RunState::ParallelExecution => "parallel_execution",
            RunState::Reviewing => "reviewing",
            RunState::AwaitingHumanDecision => "awaiting_human_decision",
            RunState::Documenting => "documenting",
            RunState::ApplyingPatches => "applying_patches",
            RunState::DevOpsSetup => "devops_setup",
            RunState::Committing => "committing",
            RunState::UpdatingMemory => "updating_memory",
            RunState::Done => "done",
            RunState::Error(_) => "error",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Current state plus every state visited, in order
#[derive(Debug, Clone)]
pub struct Pipeline {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn visited(&self, state: &RunState) -> bool {
        self.history.contains(state)
    }

    fn enter(&mut self, next: RunState) {
        if self.state.is_terminal() {
            return;
        }
        self.history.push(next.clone());
        self.state = next;
    }

    /// Advance along the main path
    pub fn advance(&mut self) {
        let next = match self.state {
            RunState::Idle => RunState::LoadingMemory,
            RunState::LoadingMemory => RunState::SelectingTask,
            RunState::SelectingTask => RunState::Planning,
            RunState::Planning => RunState::ParallelExecution,
            RunState::ParallelExecution => RunState::Reviewing,
            RunState::Reviewing | RunState::AwaitingHumanDecision => RunState::Documenting,
            RunState::Documenting => RunState::ApplyingPatches,
            RunState::ApplyingPatches => RunState::DevOpsSetup,
            RunState::DevOpsSetup => RunState::Committing,
            RunState::Committing => RunState::UpdatingMemory,
            RunState::UpdatingMemory => RunState::Done,
            RunState::Done | RunState::Error(_) => return,
        };
        self.enter(next);
    }

    /// Hold at the review gate for a human decision
    pub fn await_decision(&mut self) {
        if self.state == RunState::Reviewing {
            self.enter(RunState::AwaitingHumanDecision);
        }
    }

    /// End early without error (no task, or aborted at the gate)
    pub fn finish(&mut self) {
        self.enter(RunState::Done);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.enter(RunState::Error(reason.into()));
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }
}
