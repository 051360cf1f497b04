//! # Unified-Diff Applier
//!
//! Parses model-written unified diffs and applies them file by file.
//!
//! Models get hunk line counts wrong often enough that they are not trusted:
//! a hunk runs until the next header, and its position is found by searching
//! for the old lines near the line number the header claims.
//!
//! A file that cannot be patched is skipped and reported; the other files in
//! the same patch are still applied.

use super::PatchApplier;
use crate::domain::Patch;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch contains no file changes")]
    Empty,

    #[error("malformed patch at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("path escapes the workspace: {0}")]
    UnsafePath(String),

    #[error("file to modify does not exist: {0}")]
    MissingFile(String),

    #[error("file to create already exists: {0}")]
    AlreadyExists(String),

    #[error("hunk {hunk} does not match {path}")]
    HunkMismatch { path: String, hunk: usize },

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based line the header claims the hunk starts at in the old file
    pub old_start: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Remove(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Add(s) => Some(s.as_str()),
                HunkLine::Remove(_) => None,
            })
            .collect()
    }
}

/// Changes to one file. `None` on either side is `/dev/null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Path shown in reports
    pub fn display_path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("/dev/null")
    }
}

fn hunk_header() -> Option<&'static Regex> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HEADER
        .get_or_init(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").ok())
        .as_ref()
}

/// Header path without `a/`/`b/` prefix or trailing timestamp
fn header_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    if path == "/dev/null" {
        return None;
    }
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(path.to_string())
}

fn is_file_header(lines: &[&str], idx: usize) -> bool {
    lines[idx].starts_with("--- ")
        && lines
            .get(idx + 1)
            .map(|next| next.starts_with("+++ "))
            .unwrap_or(false)
}

/// Parse a (possibly multi-file) unified diff
pub fn parse_unified_diff(text: &str) -> Result<Vec<FilePatch>, PatchError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut files: Vec<FilePatch> = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];

        if is_file_header(&lines, idx) {
            files.push(FilePatch {
                old_path: header_path(&line[4..]),
                new_path: header_path(&lines[idx + 1][4..]),
                hunks: Vec::new(),
            });
            idx += 2;
            continue;
        }

        if line.starts_with("@@") {
            let captures = hunk_header()
                .and_then(|re| re.captures(line))
                .ok_or_else(|| PatchError::Malformed {
                    line: idx + 1,
                    reason: format!("bad hunk header '{}'", line),
                })?;
            let Some(file) = files.last_mut() else {
                return Err(PatchError::Malformed {
                    line: idx + 1,
                    reason: "hunk before any file header".to_string(),
                });
            };
            let old_start = captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);

            idx += 1;
            let mut body = Vec::new();
            while idx < lines.len() {
                let l = lines[idx];
                if l.starts_with("@@") || l.starts_with("diff --git ") || is_file_header(&lines, idx) {
                    break;
                }
                match l.chars().next() {
                    Some(' ') => body.push(HunkLine::Context(l[1..].to_string())),
                    Some('-') => body.push(HunkLine::Remove(l[1..].to_string())),
                    Some('+') => body.push(HunkLine::Add(l[1..].to_string())),
                    Some('\\') => {}
                    // Editors and models drop the space on blank context lines
                    None => body.push(HunkLine::Context(String::new())),
                    Some(_) => break,
                }
                idx += 1;
            }
            while matches!(body.last(), Some(HunkLine::Context(s)) if s.is_empty()) {
                body.pop();
            }

            file.hunks.push(Hunk {
                old_start,
                lines: body,
            });
            continue;
        }

        // `diff --git`, `index`, mode lines and stray prose between files
        idx += 1;
    }

    files.retain(|f| !(f.hunks.is_empty() && f.old_path.is_some() && f.new_path.is_some()));
    if files.is_empty() {
        return Err(PatchError::Empty);
    }
    Ok(files)
}

/// Resolve a patch path inside the workspace, refusing anything that escapes it
fn resolve(root: &Path, relative: &str) -> Result<PathBuf, PatchError> {
    let candidate = Path::new(relative);
    let safe = !relative.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(PatchError::UnsafePath(relative.to_string()));
    }
    Ok(root.join(candidate))
}

/// Position of `needle` in `haystack`, searching outward from `expected`
/// but never before `floor`
fn find_block(haystack: &[String], needle: &[&str], expected: usize, floor: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(expected.clamp(floor, haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let last = haystack.len() - needle.len();
    if floor > last {
        return None;
    }

    let matches_at = |pos: usize, loose: bool| {
        needle.iter().enumerate().all(|(i, want)| {
            let have = haystack[pos + i].as_str();
            if loose {
                have.trim_end() == want.trim_end()
            } else {
                have == *want
            }
        })
    };

    let expected = expected.clamp(floor, last);
    for loose in [false, true] {
        for distance in 0..=(last - floor) {
            let after = expected + distance;
            if after <= last && matches_at(after, loose) {
                return Some(after);
            }
            if distance > 0 && expected >= floor + distance && matches_at(expected - distance, loose) {
                return Some(expected - distance);
            }
        }
    }
    None
}

/// Apply hunks to file content
pub fn apply_hunks(original: &str, file: &FilePatch) -> Result<String, PatchError> {
    let had_trailing_newline = original.is_empty() || original.ends_with('\n');
    let eol = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = original.lines().map(String::from).collect();
    let mut cursor = 0usize;
    let mut delta: isize = 0;

    for (number, hunk) in file.hunks.iter().enumerate() {
        let old = hunk.old_lines();
        let new = hunk.new_lines();

        // A pure insertion `-N,0` goes after line N; otherwise the hunk starts at N
        let claimed = if old.is_empty() {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        let expected = (claimed as isize + delta).max(0) as usize;

        let pos = find_block(&lines, &old, expected, cursor).ok_or_else(|| PatchError::HunkMismatch {
            path: file.display_path().to_string(),
            hunk: number + 1,
        })?;

        lines.splice(pos..pos + old.len(), new.iter().map(|s| s.to_string()));
        cursor = pos + new.len();
        delta += new.len() as isize - old.len() as isize;
    }

    let mut out = lines.join(eol);
    if had_trailing_newline && !out.is_empty() {
        out.push_str(eol);
    }
    Ok(out)
}

fn io_error(path: &str) -> impl FnOnce(std::io::Error) -> PatchError {
    let path = path.to_string();
    move |source| PatchError::Io { path, source }
}

/// A file left untouched and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of applying one patch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Filesystem applier for unified diffs
#[derive(Debug, Clone, Default)]
pub struct UnifiedDiffApplier;

impl UnifiedDiffApplier {
    pub fn new() -> Self {
        Self
    }

    async fn apply_file(root: &Path, file: &FilePatch) -> Result<(), PatchError> {
        match (&file.old_path, &file.new_path) {
            (None, None) => Err(PatchError::UnsafePath("/dev/null".to_string())),

            // Create
            (None, Some(new)) => {
                let target = resolve(root, new)?;
                if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                    return Err(PatchError::AlreadyExists(new.clone()));
                }
                let content = apply_hunks("", file)?;
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(io_error(new))?;
                }
                tokio::fs::write(&target, content).await.map_err(io_error(new))
            }

            // Delete
            (Some(old), None) => {
                let target = resolve(root, old)?;
                if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
                    return Err(PatchError::MissingFile(old.clone()));
                }
                tokio::fs::remove_file(&target).await.map_err(io_error(old))
            }

            // Modify, possibly renaming
            (Some(old), Some(new)) => {
                let source = resolve(root, old)?;
                let target = resolve(root, new)?;
                let original = match tokio::fs::read_to_string(&source).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(PatchError::MissingFile(old.clone()))
                    }
                    Err(e) => return Err(io_error(old)(e)),
                };

                let patched = apply_hunks(&original, file)?;
                if target != source {
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(io_error(new))?;
                    }
                }
                tokio::fs::write(&target, patched).await.map_err(io_error(new))?;
                if target != source {
                    tokio::fs::remove_file(&source).await.map_err(io_error(old))?;
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PatchApplier for UnifiedDiffApplier {
    async fn apply(&self, root: &Path, patch: &Patch) -> Result<ApplyReport, PatchError> {
        let files = parse_unified_diff(patch.as_str())?;
        let mut report = ApplyReport::default();

        for file in &files {
            let path = file.display_path().to_string();
            match Self::apply_file(root, file).await {
                Ok(()) => report.applied.push(path),
                Err(e) => {
                    tracing::warn!(file = %path, error = %e, "Skipping file that could not be patched");
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_file() {
        let diff = "diff --git a/src/a.rs b/src/a.rs\nindex 123..456 100644\n--- a/src/a.rs\n+++ b/src/a.rs\n@@ -1,2 +1,2 @@\n fn a() {}\n-fn b() {}\n+fn c() {}\n--- /dev/null\n+++ b/src/new.rs\t2024-01-01 00:00:00\n@@ -0,0 +1 @@\n+pub fn new() {}\n";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].old_path.as_deref(), Some("src/a.rs"));
        assert_eq!(files[0].hunks[0].lines.len(), 3);
        assert_eq!(files[1].old_path, None);
        assert_eq!(files[1].new_path.as_deref(), Some("src/new.rs"));
    }

    #[test]
    fn test_parse_rejects_empty_and_orphan_hunks() {
        assert!(matches!(parse_unified_diff("just words"), Err(PatchError::Empty)));
        assert!(matches!(
            parse_unified_diff("@@ -1 +1 @@\n-a\n+b\n"),
            Err(PatchError::Malformed { .. })
        ));
    }

    #[test]
    fn test_apply_hunks_with_wrong_line_numbers() {
        let original = "one\ntwo\nthree\nfour\nfive\n";
        let file = parse_unified_diff("--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n three\n-four\n+FOUR\n five\n")
            .unwrap()
            .remove(0);
        assert_eq!(apply_hunks(original, &file).unwrap(), "one\ntwo\nthree\nFOUR\nfive\n");
    }

    #[test]
    fn test_apply_hunks_multiple_with_offsets() {
        let original = "a\nb\nc\nd\ne\nf\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,2 +1,3 @@\n a\n+a2\n b\n@@ -5,2 +6,2 @@\n e\n-f\n+F\n";
        let file = parse_unified_diff(diff).unwrap().remove(0);
        assert_eq!(apply_hunks(original, &file).unwrap(), "a\na2\nb\nc\nd\ne\nF\n");
    }

    #[test]
    fn test_apply_hunks_keeps_crlf() {
        let original = "one\r\ntwo\r\nthree\r\n";
        let file = parse_unified_diff("--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n")
            .unwrap()
            .remove(0);
        assert_eq!(apply_hunks(original, &file).unwrap(), "one\r\nTWO\r\nthree\r\n");
    }

    #[test]
    fn test_apply_hunks_mismatch() {
        let file = parse_unified_diff("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-missing\n+x\n")
            .unwrap()
            .remove(0);
        assert!(matches!(
            apply_hunks("present\n", &file),
            Err(PatchError::HunkMismatch { hunk: 1, .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let root = Path::new("/work");
        assert!(resolve(root, "src/lib.rs").is_ok());
        assert!(matches!(resolve(root, "../etc/passwd"), Err(PatchError::UnsafePath(_))));
        assert!(matches!(resolve(root, "/etc/passwd"), Err(PatchError::UnsafePath(_))));
    }

    #[tokio::test]
    async fn test_apply_create_modify_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("keep.txt"), "hello\nworld\n").unwrap();
        std::fs::write(root.join("gone.txt"), "bye\n").unwrap();

        let diff = "--- a/keep.txt\n+++ b/keep.txt\n@@ -1,2 +1,2 @@\n hello\n-world\n+rust\n--- /dev/null\n+++ b/src/new.txt\n@@ -0,0 +1,2 @@\n+line one\n+line two\n--- a/gone.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-bye\n";
        let report = UnifiedDiffApplier::new()
            .apply(root, &Patch::new(diff))
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.applied, vec!["keep.txt", "src/new.txt", "gone.txt"]);
        assert_eq!(std::fs::read_to_string(root.join("keep.txt")).unwrap(), "hello\nrust\n");
        assert_eq!(
            std::fs::read_to_string(root.join("src/new.txt")).unwrap(),
            "line one\nline two\n"
        );
        assert!(!root.join("gone.txt").exists());
    }

    #[tokio::test]
    async fn test_bad_file_is_skipped_others_applied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.txt"), "a\n").unwrap();

        let diff = "--- a/missing.txt\n+++ b/missing.txt\n@@ -1 +1 @@\n-x\n+y\n--- a/../escape.txt\n+++ b/../escape.txt\n@@ -1 +1 @@\n-x\n+y\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-a\n+A\n";
        let report = UnifiedDiffApplier::new()
            .apply(root, &Patch::new(diff))
            .await
            .unwrap();

        assert_eq!(report.applied, vec!["a.txt"]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].path, "missing.txt");
        assert!(report.skipped[1].reason.contains("escapes"));
        assert_eq!(std::fs::read_to_string(root.join("a.txt")).unwrap(), "A\n");
    }
}
