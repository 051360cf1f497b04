//! # Orchestrator
//!
//! Drives one task from selection to commit, or a bounded sequence of tasks
//! in continuous mode.
//!
//! Only the worker stage runs in parallel. Every other stage waits for the
//! previous one, and the workspace is written only while applying patches,
//! one patch at a time.

use crate::agents::{
    apply_policy, default_workers, AgentContext, AgentKind, Architect, DevOpsAgent,
    DocumentationAgent, Reviewer, TaskSelector, WorkerAgent, WorkerInput,
};
use crate::config::OrchestratorConfig;
use crate::domain::{AgentOutput, ArchitecturePlan, Patch, ResultTable, Review, Task};
use crate::error::{AgentError, OrchestratorError};
use crate::llm::radkit_generator::RadkitGenerator;
use crate::llm::TextGenerator;
use crate::memory::{MemoryStore, ProjectMemory, RunOutcomeKind};
use crate::tools::{
    Committer, FsWorkspaceScanner, GitCommitter, PatchApplier, SkippedFile, UnifiedDiffApplier,
    WorkspaceFile, WorkspaceScanner,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::bus::MessageBus;
use super::events::{new_id, EventSink, SwarmEvent, SwarmEventKind};
use super::pipeline::{Pipeline, RunState};
use super::pool::{PoolError, WorkerPool};

const ORCHESTRATOR: &str = "orchestrator";

/// External collaborators, constructed once and shared by every run
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub scanner: Arc<dyn WorkspaceScanner>,
    pub applier: Arc<dyn PatchApplier>,
    pub committer: Arc<dyn Committer>,
}

impl Collaborators {
    /// radkit backend, filesystem scanner and applier, git committer
    pub fn production(config: &OrchestratorConfig) -> Self {
        Self {
            generator: Arc::new(RadkitGenerator::new(config.model.clone())),
            scanner: Arc::new(FsWorkspaceScanner::from_config(config)),
            applier: Arc::new(UnifiedDiffApplier::new()),
            committer: Arc::new(GitCommitter::new()),
        }
    }
}

/// Review gate question sent to the UI
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub run_id: String,
    pub task: Task,
    pub review: Review,
}

/// Human decision at the review gate
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub feedback: Option<String>,
}

pub type ApprovalSender = mpsc::Sender<(ApprovalRequest, oneshot::Sender<ApprovalResponse>)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    Completed,
    NoTasks,
    Aborted,
    Cancelled,
    Failed { reason: String },
}

/// What happened to one agent's patch
#[derive(Debug, Clone, Serialize)]
pub struct PatchSummary {
    pub agent: AgentKind,
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    /// Set when nothing in the patch could be applied
    pub error: Option<String>,
}

impl PatchSummary {
    pub fn is_applied(&self) -> bool {
        !self.applied.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub states: Vec<RunState>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub task: Option<Task>,
    pub review: Option<Review>,
    pub patches: Vec<PatchSummary>,
    pub commit: Option<String>,
}

impl RunReport {
    pub fn final_state(&self) -> Option<&RunState> {
        self.states.last()
    }

    pub fn visited(&self, state: &RunState) -> bool {
        self.states.contains(state)
    }

    pub fn applied_count(&self) -> usize {
        self.patches.iter().filter(|p| p.is_applied()).count()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed | RunOutcome::NoTasks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoTasksRemain,
    CeilingReached,
    RunFailed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinuousReport {
    /// Runs that selected a task
    pub runs: Vec<RunReport>,
    pub stop_reason: StopReason,
}

/// Mutable state of one run
struct Run {
    id: String,
    pipeline: Pipeline,
    autopilot: bool,
    store: Option<MemoryStore>,
    memory: Option<ProjectMemory>,
    task: Option<Task>,
    review: Option<Review>,
    patches: Vec<PatchSummary>,
    commit: Option<String>,
}

impl Run {
    fn new(autopilot: bool) -> Self {
        Self {
            id: new_id(),
            pipeline: Pipeline::new(),
            autopilot,
            store: None,
            memory: None,
            task: None,
            review: None,
            patches: Vec::new(),
            commit: None,
        }
    }

    fn applied_count(&self) -> usize {
        self.patches.iter().filter(|p| p.is_applied()).count()
    }

    fn into_report(self, outcome: RunOutcome) -> RunReport {
        RunReport {
            run_id: self.id,
            states: self.pipeline.history().to_vec(),
            outcome,
            task: self.task,
            review: self.review,
            patches: self.patches,
            commit: self.commit,
        }
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    collaborators: Collaborators,
    workers: Vec<Arc<dyn WorkerAgent>>,
    bus: Arc<MessageBus>,
    events: EventSink,
    approval_tx: Option<ApprovalSender>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators, bus: Arc<MessageBus>) -> Self {
        Self {
            config,
            collaborators,
            workers: default_workers(),
            bus,
            events: EventSink::default(),
            approval_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Stream events (bus messages included) to the UI sink
    pub fn with_event_channel(mut self, tx: mpsc::Sender<SwarmEvent>) -> Self {
        self.bus.forward_to(tx.clone());
        self.events = EventSink::new(tx);
        self
    }

    /// Set approval channel for human-in-the-loop review gates
    pub fn with_approval_channel(mut self, tx: ApprovalSender) -> Self {
        self.approval_tx = Some(tx);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn agent_context(&self) -> AgentContext {
        AgentContext::new(
            Arc::clone(&self.collaborators.generator),
            Arc::clone(&self.bus),
            self.config.call_timeout(),
            self.cancel.clone(),
        )
    }

    /// Run one task through the full pipeline
    #[tracing::instrument(skip(self), fields(workspace = %root.display()))]
    pub async fn run_once(&self, root: &Path) -> RunReport {
        self.run_single(root, self.config.autopilot).await
    }

    /// Run tasks until none remain, the ceiling is hit, a run fails, or the
    /// token is cancelled. Review gates never wait for a human here.
    #[tracing::instrument(skip(self), fields(workspace = %root.display()))]
    pub async fn run_continuous(&self, root: &Path, max_tasks: usize) -> ContinuousReport {
        let cap = self.config.task_cap(max_tasks);
        let mut runs: Vec<RunReport> = Vec::new();
        tracing::info!(cap, "Starting continuous mode");

        let stop_reason = loop {
            if runs.len() >= cap {
                break StopReason::CeilingReached;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if !runs.is_empty() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break StopReason::Cancelled,
                    _ = tokio::time::sleep(self.config.autopilot_pause()) => {}
                }
            }

            let report = self.run_single(root, true).await;
            match &report.outcome {
                RunOutcome::NoTasks => break StopReason::NoTasksRemain,
                RunOutcome::Cancelled => {
                    runs.push(report);
                    break StopReason::Cancelled;
                }
                RunOutcome::Failed { reason } => {
                    tracing::error!(reason = %reason, "Run failed, stopping continuous mode");
                    runs.push(report);
                    break StopReason::RunFailed;
                }
                RunOutcome::Completed | RunOutcome::Aborted => {
                    tracing::info!(
                        run = runs.len() + 1,
                        cap,
                        task = report.task.as_ref().map(|t| t.title.as_str()).unwrap_or(""),
                        "Task finished"
                    );
                    runs.push(report);
                }
            }
        };

        tracing::info!(runs = runs.len(), stop_reason = ?stop_reason, "Continuous mode finished");
        ContinuousReport { runs, stop_reason }
    }

    async fn run_single(&self, root: &Path, autopilot: bool) -> RunReport {
        let mut run = Run::new(autopilot);
        self.events
            .emit(
                SwarmEvent::new(SwarmEventKind::RunStarted, ORCHESTRATOR)
                    .with_data(serde_json::json!({ "run_id": run.id })),
            )
            .await;

        let outcome = match self.drive(root, &mut run).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                tracing::warn!("Run cancelled");
                run.pipeline.fail("cancelled");
                RunOutcome::Cancelled
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %reason, "Run failed");
                run.pipeline.fail(reason.clone());
                RunOutcome::Failed { reason }
            }
        };

        let recorded = match &outcome {
            RunOutcome::Aborted => Some(RunOutcomeKind::Aborted),
            RunOutcome::Cancelled => Some(RunOutcomeKind::Cancelled),
            RunOutcome::Failed { .. } => Some(RunOutcomeKind::Failed),
            RunOutcome::Completed | RunOutcome::NoTasks => None,
        };
        if let Some(kind) = recorded {
            self.record_unfinished(&run, kind).await;
        }

        let (kind, data) = match &outcome {
            RunOutcome::Failed { reason } => (
                SwarmEventKind::RunFailed,
                serde_json::json!({ "run_id": run.id, "reason": reason }),
            ),
            other => (
                SwarmEventKind::RunCompleted,
                serde_json::json!({ "run_id": run.id, "outcome": other }),
            ),
        };
        self.events
            .emit(SwarmEvent::new(kind, ORCHESTRATOR).with_data(data))
            .await;

        run.into_report(outcome)
    }

    /// Remember a task whose run did not complete, so it is not selected again
    async fn record_unfinished(&self, run: &Run, kind: RunOutcomeKind) {
        let (Some(store), Some(memory), Some(task)) = (&run.store, &run.memory, &run.task) else {
            return;
        };
        let mut memory = memory.clone();
        memory.record_outcome(task, kind, run.applied_count(), None);
        if let Err(e) = store.save(&memory).await {
            tracing::warn!(error = %format!("{:#}", e), "Failed to record unfinished task in memory");
        }
    }

    /// Move to the next state, unless the run was cancelled
    async fn advance(&self, run: &mut Run) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        run.pipeline.advance();
        self.state_changed(run).await;
        Ok(())
    }

    async fn state_changed(&self, run: &Run) {
        let state = run.pipeline.state();
        tracing::debug!(state = %state, "Run state");
        self.events
            .emit(
                SwarmEvent::new(SwarmEventKind::StateChanged, ORCHESTRATOR)
                    .with_data(serde_json::json!({ "run_id": run.id, "state": state.name() })),
            )
            .await;
    }

    /// Run a sequential agent call, reporting it to the UI sink
    async fn track<T>(
        &self,
        agent: AgentKind,
        call: impl Future<Output = Result<T, AgentError>>,
    ) -> Result<T, AgentError> {
        self.events
            .emit(SwarmEvent::new(SwarmEventKind::AgentStarted, agent.id()))
            .await;
        let result = call.await;
        let event = match &result {
            Ok(_) => SwarmEvent::new(SwarmEventKind::AgentCompleted, agent.id()),
            Err(e) => SwarmEvent::new(SwarmEventKind::AgentFailed, agent.id())
                .with_data(serde_json::json!({ "error": e.to_string() })),
        };
        self.events.emit(event).await;
        result
    }

    async fn drive(&self, root: &Path, run: &mut Run) -> Result<RunOutcome, OrchestratorError> {
        let ctx = self.agent_context();

        // Load memory
        self.advance(run).await?;
        let store = MemoryStore::new(self.config.memory_path(root));
        let memory = store
            .load_or_create(&project_name(root))
            .await
            .map_err(|e| OrchestratorError::Memory(format!("{:#}", e)))?;
        run.store = Some(store.clone());
        run.memory = Some(memory.clone());

        // Select
        self.advance(run).await?;
        let selected = self
            .track(AgentKind::TaskSelector, TaskSelector::select(&ctx, &memory))
            .await?;
        let Some(task) = selected else {
            tracing::info!("No tasks remain");
            run.pipeline.finish();
            self.state_changed(run).await;
            return Ok(RunOutcome::NoTasks);
        };
        tracing::info!(task = %task.title, task_type = ?task.task_type, "Task selected");
        run.task = Some(task.clone());

        // Plan
        self.advance(run).await?;
        let plan = self
            .track(AgentKind::Architect, Architect::plan(&ctx, &task, &memory))
            .await?;

        // Fan out
        self.advance(run).await?;
        let files = self.scan(root).await?;
        let input = WorkerInput {
            task: task.clone(),
            plan: plan.clone(),
            files,
        };
        let mut results = self.execute_workers(&ctx, input.clone()).await?;

        // Review
        self.advance(run).await?;
        self.events
            .emit(SwarmEvent::new(SwarmEventKind::AgentStarted, AgentKind::Reviewer.id()))
            .await;
        let review = match Reviewer::try_review(&ctx, &task, &results).await {
            Ok(review) => {
                self.events
                    .emit(SwarmEvent::new(SwarmEventKind::AgentCompleted, AgentKind::Reviewer.id()))
                    .await;
                review
            }
            Err(reason) => {
                self.events
                    .emit(
                        SwarmEvent::new(SwarmEventKind::AgentFailed, AgentKind::Reviewer.id())
                            .with_data(serde_json::json!({ "error": reason })),
                    )
                    .await;
                Review::fallback(reason)
            }
        };
        run.review = Some(review.clone());

        let needs_human = !review.approved && !run.autopilot;
        self.events
            .emit(
                SwarmEvent::new(SwarmEventKind::ReviewGate, AgentKind::Reviewer.id()).with_data(
                    serde_json::json!({
                        "approved": review.approved,
                        "issues": review.issues.len(),
                        "awaiting_human": needs_human,
                        "summary": review.summary,
                    }),
                ),
            )
            .await;

        if !review.approved && run.autopilot {
            tracing::warn!(summary = %review.summary, "Review not approved, proceeding in autopilot");
        }
        if needs_human {
            run.pipeline.await_decision();
            self.state_changed(run).await;
            if !self.request_decision(run, &task, &review).await? {
                tracing::info!(task = %task.title, "Run aborted at review gate");
                run.pipeline.finish();
                self.state_changed(run).await;
                return Ok(RunOutcome::Aborted);
            }
        }

        // Document
        self.advance(run).await?;
        let docs = apply_policy(
            AgentKind::Documentation,
            self.track(
                AgentKind::Documentation,
                DocumentationAgent::document(&ctx, &task, &results),
            )
            .await,
        )?;
        let documented = docs.is_change();
        results.record(AgentKind::Documentation, docs);

        // Apply
        self.advance(run).await?;
        for (agent, patch) in results.patches() {
            self.apply_patch(root, run, agent, patch).await?;
        }

        // DevOps
        self.advance(run).await?;
        let current_files = match self.scan(root).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Rescan failed, using the pre-patch snapshot");
                input.files
            }
        };
        let devops = apply_policy(
            AgentKind::DevOps,
            self.track(
                AgentKind::DevOps,
                DevOpsAgent::setup(&ctx, Some(&task), &current_files),
            )
            .await,
        )?;
        if let AgentOutput::Patch(patch) = &devops {
            self.apply_patch(root, run, AgentKind::DevOps, patch).await?;
        }
        results.record(AgentKind::DevOps, devops);

        // Commit
        self.advance(run).await?;
        if !self.config.commit_changes {
            tracing::debug!("Committing disabled");
        } else if run.applied_count() == 0 {
            tracing::info!("No patches applied, nothing to commit");
        } else {
            match self
                .collaborators
                .committer
                .commit(root, &task.commit_message())
                .await
            {
                Ok(Some(id)) => {
                    tracing::info!(commit = %id, "Changes committed");
                    run.commit = Some(id);
                }
                Ok(None) => tracing::info!("Working tree unchanged, nothing to commit"),
                Err(e) => tracing::warn!(error = %format!("{:#}", e), "Commit failed"),
            }
        }

        // Remember
        self.advance(run).await?;
        let updated = updated_memory(&memory, &task, &plan, &review, documented, run);
        store
            .save(&updated)
            .await
            .map_err(|e| OrchestratorError::Memory(format!("{:#}", e)))?;
        run.memory = Some(updated);

        self.advance(run).await?;
        tracing::info!(
            task = %task.title,
            patches = run.applied_count(),
            "Run completed"
        );
        Ok(RunOutcome::Completed)
    }

    async fn scan(&self, root: &Path) -> Result<Vec<WorkspaceFile>, OrchestratorError> {
        let scanner = Arc::clone(&self.collaborators.scanner);
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| OrchestratorError::Scan(e.to_string()))?
            .map_err(|e| OrchestratorError::Scan(format!("{:#}", e)))
    }

    /// Fan the parallel workers out over the pool and wait for all of them
    async fn execute_workers(
        &self,
        ctx: &AgentContext,
        input: WorkerInput,
    ) -> Result<ResultTable, OrchestratorError> {
        let pool = WorkerPool::new(self.config.concurrency());
        let input = Arc::new(input);

        let jobs: Vec<_> = self
            .workers
            .iter()
            .map(|worker| {
                let worker = Arc::clone(worker);
                let ctx = ctx.clone();
                let input = Arc::clone(&input);
                let events = self.events.clone();
                async move {
                    let agent = worker.kind();
                    events
                        .emit(SwarmEvent::new(SwarmEventKind::AgentStarted, agent.id()))
                        .await;

                    let raw = worker.execute(&ctx, &input).await;
                    let event = match &raw {
                        Ok(output) => SwarmEvent::new(SwarmEventKind::AgentCompleted, agent.id())
                            .with_data(serde_json::json!({ "change": output.is_change() })),
                        Err(e) => SwarmEvent::new(SwarmEventKind::AgentFailed, agent.id())
                            .with_data(serde_json::json!({ "error": e.to_string() })),
                    };
                    events.emit(event).await;

                    apply_policy(agent, raw).map(|output| (agent, output))
                }
            })
            .collect();

        let outputs = pool.try_execute_all(jobs).await.map_err(|e| match e {
            PoolError::Job(agent_error) => OrchestratorError::Agent(agent_error),
            PoolError::Panicked(reason) => OrchestratorError::Worker(reason),
            PoolError::Closed => OrchestratorError::Worker("worker pool closed".to_string()),
        })?;

        let mut table = ResultTable::new();
        for (agent, output) in outputs {
            table.record(agent, output);
        }
        tracing::info!(
            agents = table.len(),
            changes = table.change_count(),
            "Parallel stage finished"
        );
        Ok(table)
    }

    /// Apply one patch. Failures are reported, never fatal.
    async fn apply_patch(
        &self,
        root: &Path,
        run: &mut Run,
        agent: AgentKind,
        patch: &Patch,
    ) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let summary = match self.collaborators.applier.apply(root, patch).await {
            Ok(report) => {
                tracing::info!(
                    agent = %agent,
                    applied = report.applied.len(),
                    skipped = report.skipped.len(),
                    "Patch applied"
                );
                PatchSummary {
                    agent,
                    applied: report.applied,
                    skipped: report.skipped,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(agent = %agent, error = %e, "Patch skipped");
                PatchSummary {
                    agent,
                    applied: Vec::new(),
                    skipped: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        let kind = if summary.error.is_some() {
            SwarmEventKind::PatchSkipped
        } else {
            SwarmEventKind::PatchApplied
        };
        self.events
            .emit(SwarmEvent::new(kind, agent.id()).with_data(serde_json::json!({
                "applied": summary.applied,
                "skipped": summary.skipped.len(),
                "error": summary.error,
            })))
            .await;

        run.patches.push(summary);
        Ok(())
    }

    /// Ask the human at the review gate. No channel, a dropped channel or a
    /// dropped reply all count as "abort".
    async fn request_decision(
        &self,
        run: &Run,
        task: &Task,
        review: &Review,
    ) -> Result<bool, OrchestratorError> {
        let Some(tx) = &self.approval_tx else {
            tracing::warn!("Review not approved and no approval channel configured");
            return Ok(false);
        };

        let request = ApprovalRequest {
            run_id: run.id.clone(),
            task: task.clone(),
            review: review.clone(),
        };
        let (resp_tx, resp_rx) = oneshot::channel();
        if tx.send((request, resp_tx)).await.is_err() {
            return Ok(false);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(OrchestratorError::Cancelled),
            response = resp_rx => {
                let response = response.ok();
                if let Some(feedback) = response.as_ref().and_then(|r| r.feedback.as_deref()) {
                    tracing::info!(feedback = %feedback, "Review gate feedback");
                }
                Ok(response.map(|r| r.approved).unwrap_or(false))
            }
        }
    }
}

/// Memory after a completed run
fn updated_memory(
    memory: &ProjectMemory,
    task: &Task,
    plan: &ArchitecturePlan,
    review: &Review,
    documented: bool,
    run: &Run,
) -> ProjectMemory {
    let mut updated = memory.clone();
    updated.record_outcome(
        task,
        RunOutcomeKind::Completed,
        run.applied_count(),
        run.commit.clone(),
    );
    updated.absorb_review(review);
    if documented {
        updated.absorb_plan(plan);
    }
    updated
}

/// Workspace directory name, used when bootstrapping memory
fn project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}
