//! # Architect
//!
//! Turns the selected task into the plan every worker follows, then
//! broadcasts it on the message bus. Required: a missing plan aborts the run.

use super::{render_task, AgentContext, AgentKind};
use crate::decode::{DecodeError, Decoded};
use crate::domain::{ArchitecturePlan, Task};
use crate::error::AgentError;
use crate::memory::ProjectMemory;
use crate::swarm::bus::Message;

pub struct Architect;

impl Architect {
    pub const KIND: AgentKind = AgentKind::Architect;

    pub async fn plan(
        ctx: &AgentContext,
        task: &Task,
        memory: &ProjectMemory,
    ) -> Result<ArchitecturePlan, AgentError> {
        let prompt = Self::prompt(task, memory);
        let plan = match ctx.generate_record::<ArchitecturePlan>(Self::KIND, &prompt).await? {
            Decoded::Value(plan) => plan,
            // The Architect has no sentinel, so this only happens on an empty reply
            Decoded::NoChange => {
                return Err(AgentError::Decode {
                    agent: Self::KIND,
                    source: DecodeError::Empty,
                })
            }
        };

        let summary = if plan.architecture_pattern.is_empty() {
            format!("Architecture plan ready for '{}'", task.title)
        } else {
            format!(
                "Architecture plan ready for '{}': {}",
                task.title, plan.architecture_pattern
            )
        };
        ctx.bus().publish(
            Message::broadcast(Self::KIND.id(), summary)
                .with_data(serde_json::to_value(&plan).unwrap_or_default()),
        );

        Ok(plan)
    }

    fn prompt(task: &Task, memory: &ProjectMemory) -> String {
        let stack = if memory.tech_stack.is_empty() {
            "(not recorded yet)".to_string()
        } else {
            memory.tech_stack.join(", ")
        };
        let architecture = memory
            .architecture
            .as_deref()
            .unwrap_or("(not recorded yet)");
        let decisions = if memory.decisions.is_empty() {
            "(none)".to_string()
        } else {
            memory
                .decisions
                .iter()
                .map(|d| format!("- {}", d))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Task:\n{}\n\nRecorded tech stack: {}\nRecorded architecture: {}\nPrior decisions:\n{}",
            render_task(task),
            stack,
            architecture,
            decisions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::testing::{context_with, ScriptedGenerator};

    #[tokio::test]
    async fn test_plan_is_broadcast() {
        let gen = ScriptedGenerator::new().respond(
            AgentKind::Architect,
            r#"{"architecturePattern": "layered", "decisions": ["Use axum"]}"#,
        );
        let ctx = context_with(gen);
        let mut inbox = ctx.bus().subscribe("tester");

        let plan = Architect::plan(
            &ctx,
            &Task::new("Add API", TaskType::Feature),
            &ProjectMemory::bootstrap("demo"),
        )
        .await
        .unwrap();

        assert_eq!(plan.architecture_pattern, "layered");
        let message = inbox.try_recv().unwrap();
        assert_eq!(message.from, "architect");
        assert!(message.is_broadcast());
        assert!(message.text.contains("layered"));
        assert_eq!(message.data.unwrap()["decisions"][0], "Use axum");
    }

    #[tokio::test]
    async fn test_garbage_is_fatal_error() {
        let gen = ScriptedGenerator::new().respond(AgentKind::Architect, "no idea");
        let ctx = context_with(gen);

        let err = Architect::plan(
            &ctx,
            &Task::new("Add API", TaskType::Feature),
            &ProjectMemory::bootstrap("demo"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.agent(), AgentKind::Architect);
    }

    #[test]
    fn test_prompt_includes_memory_context() {
        let mut memory = ProjectMemory::bootstrap("demo");
        memory.tech_stack = vec!["rust".into()];
        memory.decisions = vec!["JSON storage".into()];

        let prompt = Architect::prompt(&Task::new("Add API", TaskType::Feature), &memory);
        assert!(prompt.contains("Recorded tech stack: rust"));
        assert!(prompt.contains("- JSON storage"));
    }
}
