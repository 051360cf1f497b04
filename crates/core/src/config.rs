//! # Orchestrator Configuration
//!
//! Read from `<workspace>/.autopilot/config.json` when present. Every field
//! has a default so a partial file is fine.

use crate::models::ModelConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime directory name inside the workspace
pub const RUNTIME_DIR: &str = ".autopilot";

/// Hard upper bound on tasks per continuous invocation
pub const AUTOPILOT_TASK_CEILING: usize = 10;

/// Name of the runtime directory, overridable with `AUTOPILOT_RUNTIME_DIR`
pub fn runtime_dir_name() -> String {
    std::env::var("AUTOPILOT_RUNTIME_DIR").unwrap_or_else(|_| RUNTIME_DIR.to_string())
}

/// Runtime directory for a workspace
pub fn runtime_path(workspace: &Path) -> PathBuf {
    workspace.join(runtime_dir_name())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker pool bound
    pub max_concurrency: usize,
    /// Treat not-approved reviews as approved instead of asking a human
    pub autopilot: bool,
    /// Safety ceiling for continuous mode
    pub max_autopilot_tasks: usize,
    /// Pause between consecutive continuous runs
    pub autopilot_pause_ms: u64,
    /// Per-call timeout for the text-generation service
    pub call_timeout_secs: u64,
    /// File-count ceiling for workspace scans
    pub max_scan_files: usize,
    /// Files larger than this are left out of scans
    pub max_file_bytes: u64,
    /// Memory document, relative to the workspace
    pub memory_file: PathBuf,
    /// Commit applied patches
    pub commit_changes: bool,
    /// Provider and model for the text-generation backend
    pub model: ModelConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            autopilot: false,
            max_autopilot_tasks: AUTOPILOT_TASK_CEILING,
            autopilot_pause_ms: 2_000,
            call_timeout_secs: 180,
            max_scan_files: 30,
            max_file_bytes: 64 * 1024,
            memory_file: PathBuf::from(runtime_dir_name()).join("memory.json"),
            commit_changes: true,
            model: ModelConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Path of the optional config file for a workspace
    pub fn file_path(workspace: &Path) -> PathBuf {
        runtime_path(workspace).join("config.json")
    }

    /// Load the workspace config, falling back to defaults when absent
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = Self::file_path(workspace);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Worker pool bound, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    pub fn autopilot_pause(&self) -> Duration {
        Duration::from_millis(self.autopilot_pause_ms)
    }

    /// Effective task cap for a continuous invocation
    pub fn task_cap(&self, requested: usize) -> usize {
        requested
            .min(self.max_autopilot_tasks)
            .min(AUTOPILOT_TASK_CEILING)
    }

    /// Absolute memory file path for a workspace
    pub fn memory_path(&self, workspace: &Path) -> PathBuf {
        if self.memory_file.is_absolute() {
            self.memory_file.clone()
        } else {
            workspace.join(&self.memory_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.max_autopilot_tasks, 10);
        assert!(!config.autopilot);
        assert!(config.commit_changes);
    }

    #[test]
    fn test_concurrency_clamped() {
        let config = OrchestratorConfig {
            max_concurrency: 0,
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_task_cap() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.task_cap(3), 3);
        assert_eq!(config.task_cap(50), AUTOPILOT_TASK_CEILING);

        let tight = OrchestratorConfig {
            max_autopilot_tasks: 2,
            ..OrchestratorConfig::default()
        };
        assert_eq!(tight.task_cap(5), 2);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = OrchestratorConfig::file_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"max_concurrency": 2, "autopilot": true}"#).unwrap();

        let config = OrchestratorConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert!(config.autopilot);
        assert_eq!(config.max_scan_files, 30);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_concurrency, 5);
    }

    #[test]
    fn test_memory_path_relative_to_workspace() {
        let config = OrchestratorConfig::default();
        let path = config.memory_path(Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/.autopilot/memory.json"));
    }
}
