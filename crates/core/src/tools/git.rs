//! # Git Committer
//!
//! Stages everything the run changed and commits it on the current branch.
//! The runtime directory is never staged.

use super::Committer;
use crate::config::runtime_dir_name;
use anyhow::{Context, Result};
use async_trait::async_trait;
use git2::{IndexAddOption, IndexMatchedPath, Repository, Signature};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct GitCommitter;

impl GitCommitter {
    pub fn new() -> Self {
        Self
    }
}

/// Commit all changes in the repository at `root`.
///
/// Returns `None` when the staged tree equals HEAD's tree.
pub fn commit_all(root: &Path, message: &str) -> Result<Option<String>> {
    let repo = Repository::open(root)
        .with_context(|| format!("Failed to open repository at {:?}", root))?;

    let runtime_dir = runtime_dir_name();
    let mut index = repo.index().context("Failed to read index")?;
    let mut skip_runtime = |path: &Path, _spec: &[u8]| -> i32 {
        if path.starts_with(&runtime_dir) {
            1
        } else {
            0
        }
    };
    index
        .add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT,
            Some(&mut skip_runtime as &mut IndexMatchedPath),
        )
        .context("Failed to stage changes")?;
    // Deletions are not picked up by add_all
    index
        .update_all(["*"].iter(), None)
        .context("Failed to stage deletions")?;
    index.write().context("Failed to write index")?;

    let tree_id = index.write_tree().context("Failed to write tree")?;
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    if let Some(parent) = &parent {
        if parent.tree_id() == tree_id {
            return Ok(None);
        }
    }

    let tree = repo.find_tree(tree_id).context("Failed to find tree")?;
    let signature = repo
        .signature()
        .or_else(|_| Signature::now("autopilot", "autopilot@localhost"))
        .context("Failed to build commit signature")?;
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .context("Failed to create commit")?;

    Ok(Some(oid.to_string()))
}

#[async_trait]
impl Committer for GitCommitter {
    async fn commit(&self, root: &Path, message: &str) -> Result<Option<String>> {
        let root = root.to_path_buf();
        let message = message.to_string();
        tokio::task::spawn_blocking(move || commit_all(&root, &message)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_and_unchanged_tree() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".autopilot")).unwrap();
        std::fs::write(dir.path().join(".autopilot/memory.json"), "{}").unwrap();

        let committer = GitCommitter::new();
        let first = committer.commit(dir.path(), "feat: add a").await.unwrap();
        assert!(first.is_some());

        let repo = Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message(), Some("feat: add a"));
        let tree = head.tree().unwrap();
        assert!(tree.get_name("a.txt").is_some());
        assert!(tree.get_name(".autopilot").is_none());

        let second = committer.commit(dir.path(), "feat: nothing").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_non_repo_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitCommitter::new().commit(dir.path(), "x").await.is_err());
    }
}
