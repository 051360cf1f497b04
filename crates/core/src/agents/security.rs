//! # Security Auditor

use super::{render_files, AgentKind, WorkerAgent, WorkerInput};

pub struct SecurityAgent;

impl WorkerAgent for SecurityAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Security
    }

    fn prompt(&self, input: &WorkerInput) -> String {
        let deps: Vec<&String> = input.plan.tech_stack.all().collect();
        let deps = if deps.is_empty() {
            String::from("(unknown)")
        } else {
            deps.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
        };
        format!(
            "Technologies in use: {}\n\nSource files:\n{}\nAudit for vulnerabilities and fix them.",
            deps,
            render_files(&input.files)
        )
    }
}
