//! # Task Selector
//!
//! The project manager. Reads project memory and picks the next task, or
//! reports that nothing is left. Required: any failure aborts the run.

use super::{AgentContext, AgentKind};
use crate::decode::Decoded;
use crate::domain::Task;
use crate::error::AgentError;
use crate::memory::ProjectMemory;

pub struct TaskSelector;

impl TaskSelector {
    pub const KIND: AgentKind = AgentKind::TaskSelector;

    /// Pick the next task. `Ok(None)` means no tasks remain.
    pub async fn select(
        ctx: &AgentContext,
        memory: &ProjectMemory,
    ) -> Result<Option<Task>, AgentError> {
        let prompt = Self::prompt(memory);
        let decoded: Decoded<Task> = ctx.generate_record(Self::KIND, &prompt).await?;
        Ok(decoded.into_option())
    }

    fn prompt(memory: &ProjectMemory) -> String {
        let memory_json = serde_json::to_string_pretty(memory).unwrap_or_default();
        format!(
            "Project Memory:\n{}\n\nPending tasks: {}\nCompleted tasks: {}\n\nSelect the next task.",
            memory_json,
            memory.pending_tasks.len(),
            memory.completed_tasks.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::testing::{context_with, ScriptedGenerator};

    const TASK_JSON: &str = r#"```json
{"title": "Add health endpoint", "description": "GET /health", "type": "feature",
 "priority": "high", "estimatedEffort": "small"}
```"#;

    #[tokio::test]
    async fn test_selects_task() {
        let gen = ScriptedGenerator::new().respond(AgentKind::TaskSelector, TASK_JSON);
        let ctx = context_with(gen);

        let task = TaskSelector::select(&ctx, &ProjectMemory::bootstrap("demo"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.title, "Add health endpoint");
        assert_eq!(task.task_type, TaskType::Feature);
    }

    #[tokio::test]
    async fn test_no_tasks_sentinel() {
        let gen = ScriptedGenerator::new().respond(AgentKind::TaskSelector, "NO_TASKS");
        let ctx = context_with(gen);

        let task = TaskSelector::select(&ctx, &ProjectMemory::bootstrap("demo"))
            .await
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_is_error() {
        let gen = ScriptedGenerator::new().respond(AgentKind::TaskSelector, "Let me think...");
        let ctx = context_with(gen);

        let err = TaskSelector::select(&ctx, &ProjectMemory::bootstrap("demo"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Decode { agent: AgentKind::TaskSelector, .. }));
    }

    #[test]
    fn test_prompt_contains_memory() {
        let prompt = TaskSelector::prompt(&ProjectMemory::bootstrap("demo"));
        assert!(prompt.contains("\"projectName\": \"demo\""));
        assert!(prompt.contains("Pending tasks: 1"));
    }
}
