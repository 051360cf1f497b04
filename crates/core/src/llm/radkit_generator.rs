//! # Radkit Generator
//!
//! `TextGenerator` backed by radkit's `LlmFunction`. radkit always asks for
//! a structured reply, so the raw completion travels inside a one-field
//! envelope and is unwrapped before it reaches the decoder.

use super::{GenerationError, TextGenerator};
use crate::models::ModelConfig;
use crate::run_llm_function;
use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Envelope for a free-form completion
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct Completion {
    /// The complete answer exactly as instructed by the system prompt:
    /// a unified diff, a JSON document, or a single sentinel word.
    pub text: String,
}

/// Text generator for any radkit provider
#[derive(Debug, Clone)]
pub struct RadkitGenerator {
    config: ModelConfig,
}

impl RadkitGenerator {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate(&self, system_prompt: &str, user_content: &str) -> anyhow::Result<String> {
        let system = system_prompt.to_string();
        let input = user_content.to_string();
        let completion = run_llm_function!(&self.config, Completion, system, input)?;
        Ok(completion.text)
    }
}

#[async_trait]
impl TextGenerator for RadkitGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, GenerationError> {
        tracing::debug!(
            provider = self.config.provider.display_name(),
            model = %self.config.model,
            input_len = user_content.len(),
            "Sending completion request"
        );

        self.generate(system_prompt, user_content)
            .await
            .map_err(|e| GenerationError::classify(&format!("{:#}", e)))
    }
}
