//! # Domain Records
//!
//! The records that flow through one run: the selected [`Task`], the
//! Architect's [`ArchitecturePlan`], worker [`AgentOutput`]s collected in a
//! [`ResultTable`], and the Reviewer's [`Review`].

pub mod output;
pub mod plan;
pub mod review;
pub mod task;

pub use output::{AgentOutput, Patch, ResultTable};
pub use plan::{ArchitecturePlan, TechStack};
pub use review::{IssueSeverity, Review, ReviewIssue};
pub use task::{Effort, Priority, Task, TaskType};
