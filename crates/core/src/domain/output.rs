//! # Agent Output
//!
//! What a patch-producing agent hands back, and the per-run table the
//! orchestrator keeps them in.

use crate::agents::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw unified-diff text, already stripped of code fences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Patch(String);

impl Patch {
    pub fn new(diff: impl Into<String>) -> Self {
        Self(diff.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Paths touched by this patch, taken from `+++` headers
    pub fn touched_files(&self) -> Vec<String> {
        self.0
            .lines()
            .filter_map(|l| l.strip_prefix("+++ "))
            .map(|p| p.split('\t').next().unwrap_or(p).trim())
            .filter(|p| *p != "/dev/null")
            .map(|p| p.strip_prefix("b/").unwrap_or(p).to_string())
            .collect()
    }
}

/// Result of one patch-producing agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "diff", rename_all = "snake_case")]
pub enum AgentOutput {
    Patch(Patch),
    NoChange,
}

impl AgentOutput {
    pub fn patch(&self) -> Option<&Patch> {
        match self {
            AgentOutput::Patch(p) => Some(p),
            AgentOutput::NoChange => None,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, AgentOutput::Patch(_))
    }
}

/// Outputs of one run keyed by agent.
///
/// Iteration follows `AgentKind`'s ordering, which is the fixed order
/// patches are applied in. Entries are never replaced once recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultTable {
    entries: BTreeMap<AgentKind, AgentOutput>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent's output; a second write for the same agent is ignored
    pub fn record(&mut self, agent: AgentKind, output: AgentOutput) {
        self.entries.entry(agent).or_insert(output);
    }

    pub fn get(&self, agent: AgentKind) -> Option<&AgentOutput> {
        self.entries.get(&agent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentKind, &AgentOutput)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Non-empty patches in application order
    pub fn patches(&self) -> Vec<(AgentKind, &Patch)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.patch().map(|p| (*k, p)))
            .collect()
    }

    pub fn change_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_change()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
