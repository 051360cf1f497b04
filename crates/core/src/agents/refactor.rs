//! # Refactoring Engineer

use super::{render_files, AgentKind, WorkerAgent, WorkerInput};

pub struct RefactorAgent;

impl WorkerAgent for RefactorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Refactor
    }

    fn prompt(&self, input: &WorkerInput) -> String {
        let mut prompt = String::new();
        if !input.plan.guidelines.is_empty() {
            prompt.push_str("Project guidelines:\n");
            for guideline in &input.plan.guidelines {
                prompt.push_str(&format!("- {}\n", guideline));
            }
            prompt.push('\n');
        }
        if !input.plan.design_patterns.is_empty() {
            prompt.push_str(&format!(
                "Preferred patterns: {}\n\n",
                input.plan.design_patterns.join(", ")
            ));
        }
        prompt.push_str("Source files:\n");
        prompt.push_str(&render_files(&input.files));
        prompt.push_str("\nImprove code quality without changing behavior.");
        prompt
    }
}
