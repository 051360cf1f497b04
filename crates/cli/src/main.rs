//! Autopilot CLI
//!
//! Runs the orchestrator against a workspace from the terminal. Review gates
//! that need a human are answered on stdin.

use anyhow::{bail, Context};
use autopilot_core::config::{runtime_path, OrchestratorConfig, AUTOPILOT_TASK_CEILING};
use autopilot_core::memory::{MemoryStore, ProjectMemory};
use autopilot_core::models::{LlmProvider, ModelConfig};
use autopilot_core::swarm::{
    ApprovalRequest, ApprovalResponse, Collaborators, MessageBus, Orchestrator, RunOutcome,
    RunReport, SwarmEvent, SwarmEventKind,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Parser, Clone)]
#[command(author, version, about = "Autopilot - Multi-Agent Task Orchestrator")]
struct Args {
    #[command(subcommand)]
    command: CliCommand,

    /// Workspace to operate on
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Maximum number of worker agents running at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Proceed past rejected reviews without asking
    #[arg(long, global = true)]
    autopilot: bool,

    /// Apply patches but do not commit them
    #[arg(long, global = true)]
    no_commit: bool,

    /// LLM provider (anthropic, openai, gemini, openrouter, grok, deepseek)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name, defaults to the provider's default model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Print reports and memory as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Create project memory for the workspace
    Init {
        /// Project name, defaults to the workspace directory name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print a summary of project memory
    Status,
    /// Select and run a single task
    Once,
    /// Keep selecting and running tasks until none remain
    Continuous {
        /// Stop after this many tasks
        #[arg(long, default_value_t = AUTOPILOT_TASK_CEILING)]
        max_tasks: usize,
    },
}

type ApprovalReceiver = mpsc::Receiver<(ApprovalRequest, oneshot::Sender<ApprovalResponse>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let workspace = args
        .workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", args.workspace.display()))?;

    // Provider keys may live in the workspace or the current directory
    let _ = dotenvy::from_path(workspace.join(".env"));
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autopilot_cli=info,autopilot_core=info".into()),
        )
        .with_target(false)
        .init();

    let config = build_config(&args, &workspace)?;

    match args.command {
        CliCommand::Init { name } => init(&workspace, &config, name).await,
        CliCommand::Status => status(&workspace, &config, args.json).await,
        CliCommand::Once => {
            let interactive = !config.autopilot;
            let (orchestrator, printer) = build_orchestrator(config, interactive);
            let report = orchestrator.run_once(&workspace).await;
            drop(orchestrator);
            let _ = printer.await;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            match &report.outcome {
                RunOutcome::Completed | RunOutcome::NoTasks => Ok(()),
                RunOutcome::Aborted => bail!("Run aborted at the review gate"),
                RunOutcome::Cancelled => bail!("Run cancelled"),
                RunOutcome::Failed { reason } => bail!("Run failed: {}", reason),
            }
        }
        CliCommand::Continuous { max_tasks } => {
            let (orchestrator, printer) = build_orchestrator(config, false);
            let report = orchestrator.run_continuous(&workspace, max_tasks).await;
            drop(orchestrator);
            let _ = printer.await;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for run in &report.runs {
                    print_report(run);
                }
                println!(
                    "\nContinuous mode finished after {} task(s): {:?}",
                    report.runs.len(),
                    report.stop_reason
                );
            }
            if report.runs.iter().any(|r| matches!(r.outcome, RunOutcome::Failed { .. })) {
                bail!("A run failed, continuous mode stopped");
            }
            Ok(())
        }
    }
}

/// Workspace config file, then command-line overrides
fn build_config(args: &Args, workspace: &Path) -> anyhow::Result<OrchestratorConfig> {
    let mut config = OrchestratorConfig::load(workspace)?;

    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if args.autopilot {
        config.autopilot = true;
    }
    if args.no_commit {
        config.commit_changes = false;
    }

    if let Some(name) = &args.provider {
        let Some(provider) = LlmProvider::parse(name) else {
            bail!("Unknown provider: {}", name);
        };
        if provider != config.model.provider {
            config.model = ModelConfig::for_provider(provider);
        }
    }
    if let Some(model) = &args.model {
        config.model.model = model.clone();
    }

    Ok(config)
}

/// Wire the production collaborators, the event printer, the stdin review
/// gate and Ctrl-C cancellation around one orchestrator
fn build_orchestrator(config: OrchestratorConfig, interactive: bool) -> (Orchestrator, JoinHandle<()>) {
    tracing::info!(
        provider = config.model.provider.display_name(),
        model = %config.model.model,
        concurrency = config.concurrency(),
        "Starting orchestrator"
    );

    let collaborators = Collaborators::production(&config);
    let (event_tx, event_rx) = mpsc::channel(256);
    let mut orchestrator = Orchestrator::new(config, collaborators, Arc::new(MessageBus::new()))
        .with_event_channel(event_tx);

    if interactive {
        let (approval_tx, approval_rx) = mpsc::channel(1);
        tokio::spawn(answer_review_gates(approval_rx));
        orchestrator = orchestrator.with_approval_channel(approval_tx);
    }

    let token = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the run");
            token.cancel();
        }
    });

    let printer = tokio::spawn(print_events(event_rx));
    (orchestrator, printer)
}

async fn init(workspace: &Path, config: &OrchestratorConfig, name: Option<String>) -> anyhow::Result<()> {
    let store = MemoryStore::new(config.memory_path(workspace));
    if store.exists().await {
        println!("Project memory already exists: {}", store.path().display());
        return Ok(());
    }

    let name = name.unwrap_or_else(|| {
        workspace
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });
    let memory = store.load_or_create(&name).await?;

    let runtime = runtime_path(workspace);
    tokio::fs::create_dir_all(&runtime)
        .await
        .with_context(|| format!("Failed to create {}", runtime.display()))?;
    let gitignore = runtime.join(".gitignore");
    if !gitignore.exists() {
        tokio::fs::write(&gitignore, "# Never commit secrets\n.env\n*.env\n")
            .await
            .with_context(|| format!("Failed to write {}", gitignore.display()))?;
    }

    println!("Initialized project '{}'", memory.project_name);
    println!("   Memory: {}", store.path().display());
    println!("   First task: {}", memory.pending_tasks.join(", "));
    println!("\nRun `autopilot once` to work on it");
    Ok(())
}

async fn status(workspace: &Path, config: &OrchestratorConfig, json: bool) -> anyhow::Result<()> {
    let store = MemoryStore::new(config.memory_path(workspace));
    if !store.exists().await {
        println!("No project memory yet. Run `autopilot init` first.");
        return Ok(());
    }
    let memory = store.load().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
    } else {
        print_memory(&memory);
    }
    Ok(())
}

fn print_memory(memory: &ProjectMemory) {
    println!("Project: {}", memory.project_name);
    if let Some(architecture) = &memory.architecture {
        println!("Architecture: {}", architecture);
    }
    if !memory.tech_stack.is_empty() {
        println!("Tech stack: {}", memory.tech_stack.join(", "));
    }

    println!("\nPending tasks ({}):", memory.pending_tasks.len());
    for task in &memory.pending_tasks {
        println!("   - {}", task);
    }

    println!("\nCompleted tasks ({}):", memory.completed_tasks.len());
    for task in memory.completed_tasks.iter().rev().take(10) {
        println!(
            "   - [{:?}] {} ({} patches, {})",
            task.outcome,
            task.title,
            task.patches_applied,
            task.completed_at.format("%Y-%m-%d %H:%M")
        );
    }

    if !memory.known_issues.is_empty() {
        println!("\nKnown issues:");
        for issue in &memory.known_issues {
            println!("   - {}", issue);
        }
    }
}

fn print_report(report: &RunReport) {
    let title = report.task.as_ref().map(|t| t.title.as_str()).unwrap_or("-");
    println!("\nRun {} [{:?}] task: {}", report.run_id, report.outcome, title);
    for patch in &report.patches {
        match &patch.error {
            Some(error) => println!("   {}: skipped ({})", patch.agent, error),
            None => println!(
                "   {}: {} applied, {} skipped",
                patch.agent,
                patch.applied.len(),
                patch.skipped.len()
            ),
        }
    }
    if let Some(commit) = &report.commit {
        println!("   Commit: {}", commit);
    }
}

/// Render the event stream for the terminal
async fn print_events(mut rx: mpsc::Receiver<SwarmEvent>) {
    while let Some(event) = rx.recv().await {
        let field = |key: &str| {
            event
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .unwrap_or_default()
        };
        match event.kind {
            SwarmEventKind::StateChanged => println!("-> {}", field("state")),
            SwarmEventKind::AgentStarted => println!("   {} working", event.agent),
            SwarmEventKind::AgentFailed => println!("   {} failed: {}", event.agent, field("error")),
            SwarmEventKind::MessagePosted => println!("   [{}] {}", event.agent, field("text")),
            SwarmEventKind::ReviewGate => println!("   review: {}", field("summary")),
            SwarmEventKind::PatchApplied => println!("   {} patch: {}", event.agent, field("applied")),
            SwarmEventKind::PatchSkipped => println!("   {} patch skipped: {}", event.agent, field("error")),
            SwarmEventKind::RunFailed => println!("Run failed: {}", field("reason")),
            SwarmEventKind::RunStarted
            | SwarmEventKind::AgentCompleted
            | SwarmEventKind::RunCompleted => {}
        }
    }
}

/// Ask on stdin whether to proceed past a rejected review
async fn answer_review_gates(mut rx: ApprovalReceiver) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some((request, reply)) = rx.recv().await {
        println!("\nReview did not approve \"{}\"", request.task.title);
        println!("   {}", request.review.summary);
        for issue in &request.review.issues {
            println!("   [{:?}] {}: {}", issue.severity, issue.category, issue.description);
        }
        print!("Apply the changes anyway? [y/N] ");
        let _ = std::io::stdout().flush();

        let answer = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => String::new(),
        };
        let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
        let _ = reply.send(ApprovalResponse {
            approved,
            feedback: None,
        });
    }
}
