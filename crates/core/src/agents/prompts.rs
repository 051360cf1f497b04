//! Default prompt templates bundled at compile time.

/// Project manager - picks the next task from project memory
pub const TASK_SELECTOR: &str = include_str!("defaults/task_selector.md");

/// Architect - turns a task into a plan shared by all workers
pub const ARCHITECT: &str = include_str!("defaults/architect.md");

/// Feature developer - implements the task
pub const FEATURE_DEV: &str = include_str!("defaults/feature_dev.md");

/// Bug hunter - fixes defects in scanned files
pub const BUGFIX: &str = include_str!("defaults/bugfix.md");

/// Refactoring engineer - behaviour-preserving cleanups
pub const REFACTOR: &str = include_str!("defaults/refactor.md");

/// Test engineer - tests for the task
pub const TESTER: &str = include_str!("defaults/tester.md");

/// Security auditor - fixes exploitable weaknesses
pub const SECURITY: &str = include_str!("defaults/security.md");

/// Reviewer - approves or rejects the aggregated changes
pub const REVIEWER: &str = include_str!("defaults/reviewer.md");

/// Technical writer - README / API / architecture / changelog
pub const DOCUMENTATION: &str = include_str!("defaults/documentation.md");

/// DevOps - build, deploy and CI descriptors
pub const DEVOPS: &str = include_str!("defaults/devops.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("task_selector", TASK_SELECTOR),
        ("architect", ARCHITECT),
        ("feature_dev", FEATURE_DEV),
        ("bugfix", BUGFIX),
        ("refactor", REFACTOR),
        ("tester", TESTER),
        ("security", SECURITY),
        ("reviewer", REVIEWER),
        ("documentation", DOCUMENTATION),
        ("devops", DEVOPS),
    ]
}
