//! # Autopilot Agents
//!
//! Each agent is one prompt template plus one call to the text-generation
//! service, with the reply run through the shared decoder.
//!
//! ```text
//! Sequential (Required)      Parallel workers            Sequential (BestEffort)
//!   TaskSelector ─► Architect ─► FeatureDev (Required) ─► Reviewer
//!                                Bugfix                   Documentation
//!                                Refactor                 DevOps
//!                                Tester
//!                                Security
//! ```
//!
//! Failure policy is declared per agent ([`AgentKind::criticality`]) and
//! applied uniformly by [`apply_policy`].

pub mod architect;
pub mod bugfix;
pub mod devops;
pub mod documentation;
pub mod feature_dev;
pub mod prompts;
pub mod refactor;
pub mod reviewer;
pub mod security;
pub mod task_selector;
pub mod tester;

use crate::decode::{self, Decoded};
use crate::domain::{AgentOutput, ArchitecturePlan, Task};
use crate::error::AgentError;
use crate::llm::{GenerationError, TextGenerator};
use crate::swarm::bus::MessageBus;
use crate::tools::WorkspaceFile;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use architect::Architect;
pub use bugfix::BugfixAgent;
pub use devops::DevOpsAgent;
pub use documentation::DocumentationAgent;
pub use feature_dev::FeatureDevAgent;
pub use refactor::RefactorAgent;
pub use reviewer::Reviewer;
pub use security::SecurityAgent;
pub use task_selector::TaskSelector;
pub use tester::TesterAgent;

/// Every agent in the system.
///
/// Declaration order is the fixed order patches are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    FeatureDev,
    Bugfix,
    Refactor,
    Tester,
    Security,
    Documentation,
    DevOps,
    TaskSelector,
    Architect,
    Reviewer,
}

/// What a failure of this agent does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Failure aborts the run
    Required,
    /// Failure is logged and the agent contributes no change
    BestEffort,
}

impl AgentKind {
    pub const ALL: [AgentKind; 10] = [
        AgentKind::TaskSelector,
        AgentKind::Architect,
        AgentKind::FeatureDev,
        AgentKind::Bugfix,
        AgentKind::Refactor,
        AgentKind::Tester,
        AgentKind::Security,
        AgentKind::Reviewer,
        AgentKind::Documentation,
        AgentKind::DevOps,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::TaskSelector => "task_selector",
            AgentKind::Architect => "architect",
            AgentKind::FeatureDev => "feature_dev",
            AgentKind::Bugfix => "bugfix",
            AgentKind::Refactor => "refactor",
            AgentKind::Tester => "tester",
            AgentKind::Security => "security",
            AgentKind::Reviewer => "reviewer",
            AgentKind::Documentation => "documentation",
            AgentKind::DevOps => "devops",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::TaskSelector => "Project Manager",
            AgentKind::Architect => "Architect",
            AgentKind::FeatureDev => "Feature Developer",
            AgentKind::Bugfix => "Bug Hunter",
            AgentKind::Refactor => "Refactoring Engineer",
            AgentKind::Tester => "Test Engineer",
            AgentKind::Security => "Security Auditor",
            AgentKind::Reviewer => "Reviewer",
            AgentKind::Documentation => "Technical Writer",
            AgentKind::DevOps => "DevOps Engineer",
        }
    }

    pub fn criticality(&self) -> Criticality {
        match self {
            AgentKind::TaskSelector | AgentKind::Architect | AgentKind::FeatureDev => {
                Criticality::Required
            }
            _ => Criticality::BestEffort,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentKind::TaskSelector => prompts::TASK_SELECTOR,
            AgentKind::Architect => prompts::ARCHITECT,
            AgentKind::FeatureDev => prompts::FEATURE_DEV,
            AgentKind::Bugfix => prompts::BUGFIX,
            AgentKind::Refactor => prompts::REFACTOR,
            AgentKind::Tester => prompts::TESTER,
            AgentKind::Security => prompts::SECURITY,
            AgentKind::Reviewer => prompts::REVIEWER,
            AgentKind::Documentation => prompts::DOCUMENTATION,
            AgentKind::DevOps => prompts::DEVOPS,
        }
    }

    /// Literal replies that mean "nothing to do" for this agent
    pub fn no_change_sentinels(&self) -> &'static [&'static str] {
        match self {
            AgentKind::TaskSelector => &["NO_TASKS"],
            AgentKind::Bugfix => &["NO_BUGS_FOUND"],
            AgentKind::Refactor => &["NO_REFACTORING_NEEDED"],
            AgentKind::Security => &["NO_SECURITY_ISSUES"],
            AgentKind::Tester => &["NO_TESTS_NEEDED"],
            AgentKind::Documentation => &["NO_DOCS_NEEDED"],
            AgentKind::DevOps => &["NO_DEVOPS_CHANGES"],
            AgentKind::Architect | AgentKind::FeatureDev | AgentKind::Reviewer => &[],
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Shared handles every agent call goes through.
///
/// Built once per run and passed by reference; cloning is cheap.
#[derive(Clone)]
pub struct AgentContext {
    generator: Arc<dyn TextGenerator>,
    bus: Arc<MessageBus>,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        bus: Arc<MessageBus>,
        call_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generator,
            bus,
            call_timeout,
            cancel,
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// One call to the text-generation service with the agent's system
    /// prompt, bounded by the per-call timeout and the run's cancel token
    pub async fn complete(&self, agent: AgentKind, user_content: &str) -> Result<String, AgentError> {
        let timeout = self.call_timeout;
        let call = self.generator.complete(agent.system_prompt(), user_content);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GenerationError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => {
                outcome.unwrap_or_else(|_| Err(GenerationError::Timeout(timeout)))
            }
        };

        result.map_err(|source| AgentError::Generation { agent, source })
    }

    /// Call and decode a unified diff
    pub async fn generate_patch(
        &self,
        agent: AgentKind,
        user_content: &str,
    ) -> Result<AgentOutput, AgentError> {
        let raw = self.complete(agent, user_content).await?;
        match decode::decode_patch(&raw, agent.no_change_sentinels()) {
            Ok(Decoded::Value(patch)) => Ok(AgentOutput::Patch(patch)),
            Ok(Decoded::NoChange) => Ok(AgentOutput::NoChange),
            Err(source) => Err(AgentError::Decode { agent, source }),
        }
    }

    /// Call and decode a JSON record
    pub async fn generate_record<T: DeserializeOwned>(
        &self,
        agent: AgentKind,
        user_content: &str,
    ) -> Result<Decoded<T>, AgentError> {
        let raw = self.complete(agent, user_content).await?;
        decode::decode_record(&raw, agent.no_change_sentinels())
            .map_err(|source| AgentError::Decode { agent, source })
    }
}

/// Read-only input shared by the parallel workers of one run
#[derive(Debug, Clone)]
pub struct WorkerInput {
    pub task: Task,
    pub plan: ArchitecturePlan,
    pub files: Vec<WorkspaceFile>,
}

/// A patch-producing agent that runs in the parallel stage
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// User content sent alongside the agent's system prompt
    fn prompt(&self, input: &WorkerInput) -> String;

    async fn execute(
        &self,
        ctx: &AgentContext,
        input: &WorkerInput,
    ) -> Result<AgentOutput, AgentError> {
        let prompt = self.prompt(input);
        ctx.generate_patch(self.kind(), &prompt).await
    }
}

/// The five parallel workers, FeatureDev first
pub fn default_workers() -> Vec<Arc<dyn WorkerAgent>> {
    vec![
        Arc::new(FeatureDevAgent),
        Arc::new(BugfixAgent),
        Arc::new(RefactorAgent),
        Arc::new(TesterAgent),
        Arc::new(SecurityAgent),
    ]
}

/// Apply the agent's declared failure policy to a patch result.
///
/// Required agents propagate their error. BestEffort agents degrade to
/// `NoChange` with a warning, except for cancellation which always
/// propagates.
pub fn apply_policy(
    agent: AgentKind,
    result: Result<AgentOutput, AgentError>,
) -> Result<AgentOutput, AgentError> {
    match result {
        Ok(output) => Ok(output),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => match agent.criticality() {
            Criticality::Required => Err(e),
            Criticality::BestEffort => {
                tracing::warn!(agent = %agent, error = %e, "Best-effort agent failed, contributing no change");
                Ok(AgentOutput::NoChange)
            }
        },
    }
}

/// Render the task for a prompt
pub(crate) fn render_task(task: &Task) -> String {
    serde_json::to_string_pretty(task).unwrap_or_else(|_| task.title.clone())
}

/// Render the architecture plan for a prompt
pub(crate) fn render_plan(plan: &ArchitecturePlan) -> String {
    serde_json::to_string_pretty(plan).unwrap_or_default()
}

/// Render workspace files as fenced blocks under their path
pub(crate) fn render_files<'a>(files: impl IntoIterator<Item = &'a WorkspaceFile>) -> String {
    let mut out = String::new();
    for file in files {
        out.push_str(&format!("### {}\n```\n{}\n```\n\n", file.path, file.content.trim_end()));
    }
    if out.is_empty() {
        out.push_str("(no source files found)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Patch;
    use crate::testing::ScriptedGenerator;

    #[test]
    fn test_required_agents() {
        let required: Vec<_> = AgentKind::ALL
            .iter()
            .filter(|k| k.criticality() == Criticality::Required)
            .copied()
            .collect();
        assert_eq!(
            required,
            vec![AgentKind::TaskSelector, AgentKind::Architect, AgentKind::FeatureDev]
        );
    }

    #[test]
    fn test_every_agent_has_distinct_prompt() {
        let mut prompts: Vec<_> = AgentKind::ALL.iter().map(|k| k.system_prompt()).collect();
        prompts.sort();
        prompts.dedup();
        assert_eq!(prompts.len(), AgentKind::ALL.len());
    }

    #[test]
    fn test_apply_policy_best_effort_degrades() {
        let err = AgentError::Generation {
            agent: AgentKind::Bugfix,
            source: GenerationError::Backend("boom".into()),
        };
        let out = apply_policy(AgentKind::Bugfix, Err(err)).unwrap();
        assert_eq!(out, AgentOutput::NoChange);
    }

    #[test]
    fn test_apply_policy_required_propagates() {
        let err = AgentError::Generation {
            agent: AgentKind::FeatureDev,
            source: GenerationError::Backend("boom".into()),
        };
        assert!(apply_policy(AgentKind::FeatureDev, Err(err)).is_err());
    }

    #[test]
    fn test_apply_policy_cancel_always_propagates() {
        let err = AgentError::Generation {
            agent: AgentKind::Security,
            source: GenerationError::Cancelled,
        };
        assert!(apply_policy(AgentKind::Security, Err(err)).is_err());
    }

    #[test]
    fn test_apply_policy_passes_success_through() {
        let out = AgentOutput::Patch(Patch::new("--- a/x\n+++ b/x\n"));
        assert_eq!(apply_policy(AgentKind::Tester, Ok(out.clone())).unwrap(), out);
    }

    #[test]
    fn test_render_files_empty() {
        assert!(render_files(&Vec::<WorkspaceFile>::new()).contains("no source files"));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let generator = ScriptedGenerator::new()
            .respond(AgentKind::Bugfix, "NO_BUGS_FOUND")
            .delay(AgentKind::Bugfix, Duration::from_secs(5));
        let ctx = AgentContext::new(
            Arc::new(generator),
            Arc::new(MessageBus::new()),
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        let err = ctx.complete(AgentKind::Bugfix, "task").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Generation {
                source: GenerationError::Timeout(_),
                ..
            }
        ));
        // a timeout degrades like any other best-effort failure
        assert_eq!(
            apply_policy(AgentKind::Bugfix, Err(err)).unwrap(),
            AgentOutput::NoChange
        );
    }

    #[tokio::test]
    async fn test_complete_observes_cancellation() {
        let generator = ScriptedGenerator::new().delay(AgentKind::Tester, Duration::from_secs(5));
        let token = CancellationToken::new();
        let ctx = AgentContext::new(
            Arc::new(generator.clone()),
            Arc::new(MessageBus::new()),
            Duration::from_secs(30),
            token.clone(),
        );
        token.cancel();

        let err = ctx.complete(AgentKind::Tester, "task").await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
