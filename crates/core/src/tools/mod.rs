//! # Workspace Tools
//!
//! Deterministic collaborators the orchestrator drives around the agents.
//!
//! ## Modules
//!
//! - `scanner` - Bounded read-only snapshot of the workspace
//! - `patch` - Unified-diff parser and applier
//! - `git` - Commit of applied changes

pub mod git;
pub mod patch;
pub mod scanner;

use crate::domain::Patch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use git::GitCommitter;
pub use patch::{ApplyReport, PatchError, SkippedFile, UnifiedDiffApplier};
pub use scanner::FsWorkspaceScanner;

/// One scanned file, path relative to the workspace root with `/` separators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub path: String,
    pub content: String,
}

impl WorkspaceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Build, deploy or CI descriptor
    pub fn is_infrastructure(&self) -> bool {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        self.path.starts_with(".github/workflows/")
            || name.starts_with("Dockerfile")
            || name.starts_with("docker-compose")
            || name.starts_with(".env")
            || name == "Makefile"
    }
}

/// Reads a bounded snapshot of the workspace
pub trait WorkspaceScanner: Send + Sync {
    fn scan(&self, root: &Path) -> anyhow::Result<Vec<WorkspaceFile>>;
}

/// Applies one patch to the workspace
#[async_trait]
pub trait PatchApplier: Send + Sync {
    /// A returned error means nothing in the patch could be applied.
    /// Per-file failures are reported in the `ApplyReport` instead.
    async fn apply(&self, root: &Path, patch: &Patch) -> Result<ApplyReport, PatchError>;
}

/// Records applied changes in version control
#[async_trait]
pub trait Committer: Send + Sync {
    /// Returns the new commit id, or `None` when there was nothing to commit
    async fn commit(&self, root: &Path, message: &str) -> anyhow::Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_detection() {
        for path in [
            "Dockerfile",
            "deploy/Dockerfile.prod",
            "docker-compose.yml",
            ".env.example",
            ".github/workflows/ci.yml",
            "Makefile",
        ] {
            assert!(WorkspaceFile::new(path, "").is_infrastructure(), "{}", path);
        }
        assert!(!WorkspaceFile::new("src/main.rs", "").is_infrastructure());
        assert!(!WorkspaceFile::new("docs/Makefile.md", "").is_infrastructure());
    }
}
