//! # Memory Store
//!
//! Loads and saves [`ProjectMemory`] as pretty JSON. Saving never touches
//! the record, so a save/load round trip is lossless.

use super::project_memory::ProjectMemory;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Load the memory document
    pub async fn load(&self) -> Result<ProjectMemory> {
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read memory file: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse memory file: {}", self.path.display()))
    }

    /// Load the memory document, creating and persisting a bootstrap record
    /// when it does not exist yet
    pub async fn load_or_create(&self, project_name: &str) -> Result<ProjectMemory> {
        if self.exists().await {
            return self.load().await;
        }

        let memory = ProjectMemory::bootstrap(project_name);
        self.save(&memory).await?;
        tracing::info!(path = %self.path.display(), "Created project memory");
        Ok(memory)
    }

    /// Persist the memory document.
    ///
    /// Written to a sibling temp file first, then renamed over the target.
    pub async fn save(&self, memory: &ProjectMemory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(memory).context("Failed to serialize project memory")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write memory file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace memory file: {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskType};
    use crate::memory::RunOutcomeKind;

    #[tokio::test]
    async fn test_load_or_create_bootstraps_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join(".autopilot/memory.json"));

        assert!(!store.exists().await);
        let first = store.load_or_create("demo").await.unwrap();
        assert!(store.exists().await);

        let second = store.load_or_create("other-name").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.project_name, "demo");
    }

    #[tokio::test]
    async fn test_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("memory.json"));

        let mut memory = ProjectMemory::bootstrap("demo");
        memory.tech_stack = vec!["rust".into(), "tokio".into()];
        memory.architecture = Some("pipeline".into());
        memory.decisions.push("JSON over sqlite".into());
        memory.known_issues.push("flaky test".into());
        memory.dependencies.push("serde".into());
        memory.record_outcome(
            &Task::new("Write docs", TaskType::Docs),
            RunOutcomeKind::Completed,
            1,
            Some("deadbeef".into()),
        );

        store.save(&memory).await.unwrap();
        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, memory);

        // Saving again must not mutate anything either
        store.save(&reloaded).await.unwrap();
        assert_eq!(store.load().await.unwrap(), memory);
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = MemoryStore::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse memory file"));
    }
}
