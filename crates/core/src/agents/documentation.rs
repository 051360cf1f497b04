//! # Technical Writer
//!
//! Runs after the review gate and documents the patches that will be applied.

use super::{render_task, AgentContext, AgentKind};
use crate::domain::{AgentOutput, ResultTable, Task};
use crate::error::AgentError;

pub struct DocumentationAgent;

impl DocumentationAgent {
    pub const KIND: AgentKind = AgentKind::Documentation;

    pub async fn document(
        ctx: &AgentContext,
        task: &Task,
        results: &ResultTable,
    ) -> Result<AgentOutput, AgentError> {
        ctx.generate_patch(Self::KIND, &Self::prompt(task, results)).await
    }

    fn prompt(task: &Task, results: &ResultTable) -> String {
        let mut prompt = format!("Task:\n{}\n\nChanges made:\n", render_task(task));
        let patches = results.patches();
        if patches.is_empty() {
            prompt.push_str("(none)\n");
        }
        for (agent, patch) in patches {
            prompt.push_str(&format!("\n# from {}\n{}", agent, patch.as_str()));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Patch, TaskType};
    use crate::testing::{context_with, ScriptedGenerator};

    #[tokio::test]
    async fn test_docs_sentinel() {
        let gen = ScriptedGenerator::new().respond(AgentKind::Documentation, "NO_DOCS_NEEDED");
        let ctx = context_with(gen);

        let out = DocumentationAgent::document(&ctx, &Task::new("x", TaskType::Docs), &ResultTable::new())
            .await
            .unwrap();
        assert_eq!(out, AgentOutput::NoChange);
    }

    #[test]
    fn test_prompt_includes_patches() {
        let mut table = ResultTable::new();
        table.record(AgentKind::Tester, AgentOutput::Patch(Patch::new("--- a/t\n+++ b/t\n")));
        let prompt = DocumentationAgent::prompt(&Task::new("x", TaskType::Feature), &table);
        assert!(prompt.contains("# from tester\n--- a/t"));
    }
}
