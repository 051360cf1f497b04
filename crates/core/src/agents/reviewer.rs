//! # Reviewer
//!
//! Judges the aggregated result table. Never fails: when the verdict cannot
//! be obtained the run continues as approved.

use super::{render_task, AgentContext, AgentKind};
use crate::decode::Decoded;
use crate::domain::{AgentOutput, ResultTable, Review, Task};

pub struct Reviewer;

impl Reviewer {
    pub const KIND: AgentKind = AgentKind::Reviewer;

    pub async fn review(ctx: &AgentContext, task: &Task, results: &ResultTable) -> Review {
        Self::try_review(ctx, task, results)
            .await
            .unwrap_or_else(|reason| Review::fallback(reason))
    }

    /// The verdict, or why it could not be obtained
    pub async fn try_review(
        ctx: &AgentContext,
        task: &Task,
        results: &ResultTable,
    ) -> Result<Review, String> {
        if results.change_count() == 0 {
            return Ok(Review::nothing_to_review());
        }

        let prompt = Self::prompt(task, results);
        match ctx.generate_record::<Review>(Self::KIND, &prompt).await {
            Ok(Decoded::Value(review)) => Ok(review),
            Ok(Decoded::NoChange) => Err("empty verdict".to_string()),
            Err(e) => {
                tracing::warn!(agent = %Self::KIND, error = %e, "Review unavailable, approving by default");
                Err(e.to_string())
            }
        }
    }

    fn prompt(task: &Task, results: &ResultTable) -> String {
        let mut prompt = format!("Task:\n{}\n\nProposed changes:\n", render_task(task));
        for (agent, output) in results.iter() {
            match output {
                AgentOutput::Patch(patch) => {
                    prompt.push_str(&format!(
                        "\n## {} ({})\n```diff\n{}```\n",
                        agent.display_name(),
                        agent,
                        patch.as_str()
                    ));
                }
                AgentOutput::NoChange => {
                    prompt.push_str(&format!("\n## {} ({})\nNo change proposed.\n", agent.display_name(), agent));
                }
            }
        }
        prompt
    }
}
