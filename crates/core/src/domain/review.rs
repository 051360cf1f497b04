//! # Review
//!
//! The Reviewer's verdict on the aggregated changes of one run.

use serde::{Deserialize, Serialize};

/// Severity of a review issue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    #[serde(alias = "blocking")]
    Critical,
    #[serde(alias = "major")]
    High,
    Medium,
    #[serde(alias = "minor")]
    Low,
    #[serde(alias = "suggestion")]
    Info,
    /// Anything the model invents that we don't recognise
    #[serde(other)]
    Unknown,
}

impl IssueSeverity {
    /// Issues at this level are worth remembering across runs
    pub fn is_serious(&self) -> bool {
        matches!(self, IssueSeverity::Critical | IssueSeverity::High)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewIssue {
    pub severity: IssueSeverity,
    #[serde(default)]
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub positives: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl Review {
    /// Verdict used when the Reviewer itself could not produce one.
    ///
    /// Review is a safety net, never a hard gate, so an unavailable reviewer
    /// approves.
    pub fn fallback(reason: impl std::fmt::Display) -> Self {
        Self {
            approved: true,
            issues: Vec::new(),
            positives: Vec::new(),
            summary: format!("Review failed ({}); approving by default", reason),
        }
    }

    /// Verdict used when no agent produced a change to review
    pub fn nothing_to_review() -> Self {
        Self {
            approved: true,
            issues: Vec::new(),
            positives: Vec::new(),
            summary: "No changes were proposed".to_string(),
        }
    }

    pub fn serious_issues(&self) -> impl Iterator<Item = &ReviewIssue> {
        self.issues.iter().filter(|i| i.severity.is_serious())
    }
}
