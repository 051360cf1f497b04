//! # Test Engineer
//!
//! Writes tests for the task's acceptance criteria.

use super::{render_files, render_task, AgentKind, WorkerAgent, WorkerInput};

pub struct TesterAgent;

impl WorkerAgent for TesterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Tester
    }

    fn prompt(&self, input: &WorkerInput) -> String {
        let frameworks: Vec<&str> = input.plan.tech_stack.testing.iter().map(String::as_str).collect();
        let frameworks = if frameworks.is_empty() {
            "the project's existing test setup".to_string()
        } else {
            frameworks.join(", ")
        };

        format!(
            "Task:\n{}\n\nTest with: {}\n\nSource files:\n{}\nWrite tests covering the acceptance criteria.",
            render_task(&input.task),
            frameworks,
            render_files(&input.files)
        )
    }
}
