//! # DevOps Engineer
//!
//! Keeps build, CI and environment descriptors in line with the code. The
//! task is optional so the agent can also run against a bare workspace.

use super::{render_task, AgentContext, AgentKind};
use crate::domain::{AgentOutput, Task};
use crate::error::AgentError;
use crate::tools::WorkspaceFile;

pub struct DevOpsAgent;

impl DevOpsAgent {
    pub const KIND: AgentKind = AgentKind::DevOps;

    pub async fn setup(
        ctx: &AgentContext,
        task: Option<&Task>,
        files: &[WorkspaceFile],
    ) -> Result<AgentOutput, AgentError> {
        ctx.generate_patch(Self::KIND, &Self::prompt(task, files)).await
    }

    fn prompt(task: Option<&Task>, files: &[WorkspaceFile]) -> String {
        let mut prompt = String::new();
        if let Some(task) = task {
            prompt.push_str(&format!("Task just implemented:\n{}\n\n", render_task(task)));
        }
        prompt.push_str("Workspace files:\n");
        for file in files {
            prompt.push_str(&format!("- {}\n", file.path));
        }
        // Descriptors are small; their contents decide whether anything is out of date
        for file in files.iter().filter(|f| f.is_infrastructure()) {
            prompt.push_str(&format!("\n### {}\n```\n{}\n```\n", file.path, file.content.trim_end()));
        }
        prompt
    }
}
