//! # Text Generation
//!
//! The single seam to the external text-generation service. Every agent
//! sends one `(system prompt, user content)` pair and gets raw text back;
//! interpreting that text is the job of [`crate::decode`].

pub mod helpers;
pub mod radkit_generator;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use radkit_generator::RadkitGenerator;

/// Failure categories surfaced by the text-generation service.
///
/// The first three carry an actionable message because they are fatal to
/// a run and end up verbatim in the run's error state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("API quota exceeded: check the provider plan and billing details ({0})")]
    QuotaExceeded(String),

    #[error("invalid API credentials: set a valid key for the configured provider ({0})")]
    InvalidCredentials(String),

    #[error("rate limited by the provider: wait before retrying ({0})")]
    RateLimited(String),

    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("text generation cancelled")]
    Cancelled,

    #[error("text generation failed: {0}")]
    Backend(String),
}

impl GenerationError {
    /// Map a provider error message onto a category.
    ///
    /// Quota is checked before rate limiting: OpenAI reports exhausted quota
    /// as HTTP 429 with `insufficient_quota`.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["quota", "billing", "credit balance", "insufficient_quota"]) {
            GenerationError::QuotaExceeded(message.to_string())
        } else if has(&[
            "401",
            "403",
            "unauthorized",
            "invalid api key",
            "invalid x-api-key",
            "incorrect api key",
            "authentication",
            "api_key",
            "api key",
        ]) {
            GenerationError::InvalidCredentials(message.to_string())
        } else if has(&["429", "rate limit", "rate_limit", "too many requests", "overloaded"]) {
            GenerationError::RateLimited(message.to_string())
        } else {
            GenerationError::Backend(message.to_string())
        }
    }
}

/// The external text-generation collaborator.
///
/// Implementations are expected to be deterministic (temperature 0) with a
/// bounded output length. One handle is built per process and shared by
/// reference with every agent.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_content: &str)
        -> Result<String, GenerationError>;
}
