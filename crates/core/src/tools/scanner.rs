//! # Workspace Scanner
//!
//! Bounded read-only snapshot of the workspace handed to the agents.
//! Walks with `ignore` so `.gitignore` is honoured. Dot-directories such as
//! `.github` are walked; `.git` and the runtime directory never are.

use super::{WorkspaceFile, WorkspaceScanner};
use crate::config::{runtime_dir_name, OrchestratorConfig};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Extensions worth showing to a model
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "py", "go", "java", "kt", "rb", "php", "c", "h",
    "cpp", "hpp", "cs", "swift", "html", "css", "scss", "vue", "svelte", "sql", "sh", "toml",
    "yaml", "yml", "json", "md",
];

/// Extension-less files that still matter
const KNOWN_FILES: &[&str] = &["Dockerfile", "Makefile"];

/// Dotfiles the infrastructure stage looks for. `.env` itself holds secrets.
const KNOWN_DOTFILES: &[&str] = &[".env.example", ".dockerignore"];

/// Directories skipped even when no ignore file mentions them
const SKIP_DIRS: &[&str] = &["target", "node_modules", "dist", "build", "vendor"];

#[derive(Debug, Clone)]
pub struct FsWorkspaceScanner {
    max_files: usize,
    max_file_bytes: u64,
}

impl FsWorkspaceScanner {
    pub fn new(max_files: usize, max_file_bytes: u64) -> Self {
        Self {
            max_files,
            max_file_bytes,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.max_scan_files, config.max_file_bytes)
    }

    fn is_candidate(path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if KNOWN_DOTFILES.contains(&name) || KNOWN_FILES.iter().any(|known| name.starts_with(known))
        {
            return true;
        }
        if name.starts_with(".env") {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    fn candidates(&self, root: &Path) -> Vec<PathBuf> {
        let runtime_dir = runtime_dir_name();
        let walker = ignore::WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.depth() > 0
                    && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                    && (name == ".git"
                        || name == runtime_dir.as_str()
                        || SKIP_DIRS.iter().any(|d| *d == name)))
            })
            .build();

        let mut paths: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| {
                entry
                    .metadata()
                    .map(|m| m.len() <= self.max_file_bytes)
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .filter(|path| Self::is_candidate(path))
            .collect();

        paths.sort();
        paths
    }

    /// Read candidates until the file limit. A file that cannot be read is
    /// left out of the snapshot.
    fn read_snapshot(&self, root: &Path, paths: Vec<PathBuf>) -> Vec<WorkspaceFile> {
        let mut files = Vec::new();
        for path in paths {
            if files.len() >= self.max_files {
                break;
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            // Binary or non-UTF-8 content is of no use in a prompt
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(WorkspaceFile::new(relative, content));
        }
        files
    }
}

impl WorkspaceScanner for FsWorkspaceScanner {
    fn scan(&self, root: &Path) -> Result<Vec<WorkspaceFile>> {
        if !root.is_dir() {
            anyhow::bail!("Workspace is not a directory: {}", root.display());
        }

        let files = self.read_snapshot(root, self.candidates(root));
        tracing::debug!(root = %root.display(), files = files.len(), "Workspace scanned");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::create_dir_all(root.join(".autopilot")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn lib() {}\n").unwrap();
        fs::write(root.join("Dockerfile"), "FROM rust:1\n").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("target/debug/out.rs"), "// generated\n").unwrap();
        fs::write(root.join(".autopilot/memory.json"), "{}").unwrap();
        fs::write(root.join(".gitignore"), "secret.rs\n").unwrap();
        fs::write(root.join("secret.rs"), "const KEY: &str = \"x\";\n").unwrap();
        fs::create_dir_all(root.join(".git/hooks")).unwrap();
        fs::create_dir_all(root.join(".github/workflows")).unwrap();
        fs::write(root.join(".git/hooks/pre-commit.sh"), "#!/bin/sh\n").unwrap();
        fs::write(root.join(".github/workflows/ci.yml"), "on: push\n").unwrap();
        fs::write(root.join(".env"), "API_KEY=secret\n").unwrap();
        fs::write(root.join(".env.example"), "API_KEY=\n").unwrap();
        dir
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = workspace();
        let files = FsWorkspaceScanner::new(30, 64 * 1024).scan(dir.path()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                ".env.example",
                ".github/workflows/ci.yml",
                "Dockerfile",
                "src/lib.rs",
                "src/main.rs"
            ]
        );
    }

    #[test]
    fn test_scan_sees_ci_but_not_git_or_secrets() {
        let dir = workspace();
        let files = FsWorkspaceScanner::new(30, 64 * 1024).scan(dir.path()).unwrap();

        let ci = files.iter().find(|f| f.path == ".github/workflows/ci.yml").unwrap();
        assert!(ci.is_infrastructure());
        assert!(files.iter().all(|f| !f.path.starts_with(".git/")));
        assert!(files.iter().all(|f| f.path != ".env"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = workspace();
        let scanner = FsWorkspaceScanner::new(30, 64 * 1024);
        let mut paths = scanner.candidates(dir.path());
        // Deleted between the walk and the read
        fs::remove_file(dir.path().join("src/lib.rs")).unwrap();
        paths.push(dir.path().join("src/gone.rs"));

        let files = scanner.read_snapshot(dir.path(), paths);
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"src/main.rs"));
        assert!(!paths.contains(&"src/lib.rs"));
    }

    #[test]
    fn test_scan_respects_limits() {
        let dir = workspace();
        let files = FsWorkspaceScanner::new(1, 64 * 1024).scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);

        fs::write(dir.path().join("src/big.rs"), "x".repeat(200)).unwrap();
        let files = FsWorkspaceScanner::new(30, 100).scan(dir.path()).unwrap();
        assert!(files.iter().all(|f| f.path != "src/big.rs"));
    }

    #[test]
    fn test_scan_missing_root() {
        let result = FsWorkspaceScanner::new(30, 1024).scan(Path::new("/definitely/not/here"));
        assert!(result.is_err());
    }
}
