//! # Feature Developer
//!
//! Writes the code for the task. The only required worker: when it fails,
//! the run fails.

use super::{render_files, render_plan, render_task, AgentKind, WorkerAgent, WorkerInput};
use crate::tools::WorkspaceFile;

pub struct FeatureDevAgent;

impl FeatureDevAgent {
    /// Files the task names, or the whole snapshot when it names none that exist
    fn relevant_files(input: &WorkerInput) -> Vec<&WorkspaceFile> {
        let named: Vec<&WorkspaceFile> = input
            .files
            .iter()
            .filter(|f| input.task.files_to_modify.iter().any(|p| p == &f.path))
            .collect();

        if named.is_empty() {
            input.files.iter().collect()
        } else {
            named
        }
    }
}

impl WorkerAgent for FeatureDevAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::FeatureDev
    }

    fn prompt(&self, input: &WorkerInput) -> String {
        let mut prompt = format!(
            "Task:\n{}\n\nArchitecture:\n{}\n\n",
            render_task(&input.task),
            render_plan(&input.plan)
        );

        if !input.task.files_to_create.is_empty() {
            prompt.push_str("Files to create:\n");
            for path in &input.task.files_to_create {
                prompt.push_str(&format!("- {}\n", path));
            }
            prompt.push('\n');
        }

        prompt.push_str("Existing files:\n");
        prompt.push_str(&render_files(Self::relevant_files(input)));
        prompt.push_str("\nImplement the task as a unified diff.");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArchitecturePlan, Task, TaskType};

    fn input(files_to_modify: &[&str]) -> WorkerInput {
        let mut task = Task::new("Add greeting", TaskType::Feature);
        task.files_to_modify = files_to_modify.iter().map(|s| s.to_string()).collect();
        task.files_to_create = vec!["src/greet.rs".into()];
        WorkerInput {
            task,
            plan: ArchitecturePlan::default(),
            files: vec![
                WorkspaceFile::new("src/main.rs", "fn main() {}"),
                WorkspaceFile::new("src/lib.rs", "pub mod x;"),
            ],
        }
    }

    #[test]
    fn test_prompt_focuses_on_named_files() {
        let prompt = FeatureDevAgent.prompt(&input(&["src/lib.rs"]));
        assert!(prompt.contains("### src/lib.rs"));
        assert!(!prompt.contains("### src/main.rs"));
        assert!(prompt.contains("- src/greet.rs"));
    }

    #[test]
    fn test_prompt_falls_back_to_all_files() {
        let prompt = FeatureDevAgent.prompt(&input(&["src/missing.rs"]));
        assert!(prompt.contains("### src/lib.rs"));
        assert!(prompt.contains("### src/main.rs"));
    }
}
