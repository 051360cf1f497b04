//! Test doubles for the external collaborators.

use crate::agents::{AgentContext, AgentKind};
use crate::domain::Patch;
use crate::llm::{GenerationError, TextGenerator};
use crate::swarm::bus::MessageBus;
use crate::tools::{ApplyReport, Committer, PatchApplier, PatchError, WorkspaceFile, WorkspaceScanner};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Reply = Result<String, GenerationError>;

#[derive(Default)]
struct Script {
    queued: HashMap<AgentKind, VecDeque<Reply>>,
    repeated: HashMap<AgentKind, Reply>,
    delays: HashMap<AgentKind, Duration>,
    calls: HashMap<AgentKind, usize>,
}

/// Text generator answering per agent, recognised by its system prompt.
///
/// Queued replies are used first, then the repeated one. An agent with no
/// script answers with its "no change" sentinel, or fails when it has none.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call from `agent` with `text`
    pub fn respond(self, agent: AgentKind, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .repeated
            .insert(agent, Ok(text.to_string()));
        self
    }

    /// Answer the next calls from `agent` in order, before any repeated reply
    pub fn respond_once(self, agent: AgentKind, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(agent)
            .or_default()
            .push_back(Ok(text.to_string()));
        self
    }

    /// Fail every call from `agent`
    pub fn fail(self, agent: AgentKind, error: GenerationError) -> Self {
        self.script.lock().unwrap().repeated.insert(agent, Err(error));
        self
    }

    /// Delay every reply to `agent`
    pub fn delay(self, agent: AgentKind, delay: Duration) -> Self {
        self.script.lock().unwrap().delays.insert(agent, delay);
        self
    }

    pub fn calls(&self, agent: AgentKind) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(&agent)
            .copied()
            .unwrap_or(0)
    }

    fn next_reply(&self, agent: AgentKind) -> (Reply, Option<Duration>) {
        let mut script = self.script.lock().unwrap();
        *script.calls.entry(agent).or_default() += 1;
        let delay = script.delays.get(&agent).copied();

        if let Some(reply) = script.queued.get_mut(&agent).and_then(|q| q.pop_front()) {
            return (reply, delay);
        }
        if let Some(reply) = script.repeated.get(&agent) {
            return (reply.clone(), delay);
        }
        let fallback = match agent.no_change_sentinels().first() {
            Some(sentinel) => Ok(sentinel.to_string()),
            None => Err(GenerationError::Backend(format!("no scripted reply for {}", agent))),
        };
        (fallback, delay)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, system_prompt: &str, _user_content: &str) -> Result<String, GenerationError> {
        let agent = AgentKind::ALL
            .into_iter()
            .find(|k| k.system_prompt() == system_prompt)
            .ok_or_else(|| GenerationError::Backend("unknown system prompt".to_string()))?;

        let (reply, delay) = self.next_reply(agent);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

/// Agent context over a scripted generator with a fresh bus
pub fn context_with(generator: ScriptedGenerator) -> AgentContext {
    AgentContext::new(
        Arc::new(generator),
        Arc::new(MessageBus::new()),
        Duration::from_secs(5),
        CancellationToken::new(),
    )
}

/// Applier that records patches instead of touching the filesystem
#[derive(Clone, Default)]
pub struct RecordingApplier {
    applied: Arc<Mutex<Vec<Patch>>>,
}

impl RecordingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patches(&self) -> Vec<Patch> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl PatchApplier for RecordingApplier {
    async fn apply(&self, _root: &Path, patch: &Patch) -> Result<ApplyReport, PatchError> {
        self.applied.lock().unwrap().push(patch.clone());
        Ok(ApplyReport {
            applied: patch.touched_files(),
            skipped: Vec::new(),
        })
    }
}

/// Scanner returning a fixed snapshot
#[derive(Clone, Default)]
pub struct StaticScanner {
    files: Vec<WorkspaceFile>,
}

impl StaticScanner {
    pub fn new(files: Vec<WorkspaceFile>) -> Self {
        Self { files }
    }
}

impl WorkspaceScanner for StaticScanner {
    fn scan(&self, _root: &Path) -> anyhow::Result<Vec<WorkspaceFile>> {
        Ok(self.files.clone())
    }
}

/// Committer that records messages and returns a fixed id
#[derive(Clone, Default)]
pub struct NoopCommitter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl NoopCommitter {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Committer for NoopCommitter {
    async fn commit(&self, _root: &Path, message: &str) -> anyhow::Result<Option<String>> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(Some("0000000".to_string()))
    }
}

/// Minimal single-file diff touching `path`
pub fn diff_for(path: &str) -> String {
    format!("--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n-old\n+new\n")
}
