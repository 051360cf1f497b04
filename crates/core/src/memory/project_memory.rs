//! # Project Memory
//!
//! The durable record the Task-Selector reasons over. Mutated only at the
//! end of a run by the orchestrator.

use crate::domain::{ArchitecturePlan, Review, Task, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written into new memory documents
pub const MEMORY_SCHEMA_VERSION: u32 = 1;

/// Pending task seeded into a fresh memory document
pub const BOOTSTRAP_TASK: &str =
    "Analyze the existing codebase and establish the project structure and core architecture";

/// How a run ended for the task it selected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcomeKind {
    Completed,
    Aborted,
    Failed,
    Cancelled,
}

/// A task that has left the pending list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub completed_at: DateTime<Utc>,
    pub outcome: RunOutcomeKind,
    #[serde(default)]
    pub patches_applied: usize,
    #[serde(default)]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemory {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub project_name: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub completed_tasks: Vec<CompletedTask>,
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ProjectMemory {
    /// Fresh memory for a project, seeded with the bootstrap task
    pub fn bootstrap(project_name: impl Into<String>) -> Self {
        Self {
            version: MEMORY_SCHEMA_VERSION,
            created_at: Utc::now(),
            project_name: project_name.into(),
            tech_stack: Vec::new(),
            architecture: None,
            completed_tasks: Vec::new(),
            pending_tasks: vec![BOOTSTRAP_TASK.to_string()],
            decisions: Vec::new(),
            known_issues: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Move a task out of the pending list and into the completed list.
    ///
    /// Tasks the selector invented (not in `pending_tasks`) are recorded the
    /// same way.
    pub fn record_outcome(
        &mut self,
        task: &Task,
        outcome: RunOutcomeKind,
        patches_applied: usize,
        commit: Option<String>,
    ) {
        let title = task.title.trim();
        self.pending_tasks
            .retain(|pending| !pending.trim().eq_ignore_ascii_case(title));

        self.completed_tasks.push(CompletedTask {
            title: title.to_string(),
            task_type: task.task_type,
            completed_at: Utc::now(),
            outcome,
            patches_applied,
            commit,
        });
    }

    /// Remember critical and high review findings as known issues
    pub fn absorb_review(&mut self, review: &Review) {
        for issue in review.serious_issues() {
            let entry = if issue.category.is_empty() {
                issue.description.clone()
            } else {
                format!("[{}] {}", issue.category, issue.description)
            };
            push_unique(&mut self.known_issues, entry);
        }
    }

    /// Fold an architecture plan's decisions and stack into memory
    pub fn absorb_plan(&mut self, plan: &ArchitecturePlan) {
        if !plan.architecture_pattern.trim().is_empty() {
            self.architecture = Some(plan.architecture_pattern.trim().to_string());
        }
        for tech in plan.tech_stack.all() {
            push_unique(&mut self.tech_stack, tech.clone());
        }
        for decision in &plan.decisions {
            push_unique(&mut self.decisions, decision.clone());
        }
    }

    pub fn is_completed(&self, title: &str) -> bool {
        self.completed_tasks
            .iter()
            .any(|t| t.title.eq_ignore_ascii_case(title.trim()))
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if !value.is_empty() && !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}
