//! # Bug Hunter
//!
//! Looks for defects in the current source and answers with a fix or
//! `NO_BUGS_FOUND`.

use super::{render_files, render_task, AgentKind, WorkerAgent, WorkerInput};

pub struct BugfixAgent;

impl WorkerAgent for BugfixAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Bugfix
    }

    fn prompt(&self, input: &WorkerInput) -> String {
        format!(
            "Current task (for context):\n{}\n\nSource files:\n{}\nFind and fix bugs.",
            render_task(&input.task),
            render_files(&input.files)
        )
    }
}
