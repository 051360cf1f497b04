//! # Task
//!
//! The unit of work picked by the Task-Selector. Immutable once selected.

use serde::{Deserialize, Serialize};

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Feature,
    Bugfix,
    Refactor,
    Test,
    Docs,
}

impl TaskType {
    /// Conventional-commit prefix for this kind of change
    pub fn commit_prefix(&self) -> &'static str {
        match self {
            TaskType::Feature => "feat",
            TaskType::Bugfix => "fix",
            TaskType::Refactor => "refactor",
            TaskType::Test => "test",
            TaskType::Docs => "docs",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Small,
    Medium,
    Large,
}

/// A selected unit of work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub priority: Priority,
    pub estimated_effort: Effort,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub files_to_create: Vec<String>,
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl Task {
    /// Minimal task, mostly useful for tests and the CLI
    pub fn new(title: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            task_type,
            priority: Priority::Medium,
            estimated_effort: Effort::Medium,
            dependencies: Vec::new(),
            files_to_create: Vec::new(),
            files_to_modify: Vec::new(),
            acceptance_criteria: Vec::new(),
        }
    }

    /// One-line commit subject for this task
    pub fn commit_message(&self) -> String {
        format!("{}: {}", self.task_type.commit_prefix(), self.title.trim())
    }
}
