//! # Errors
//!
//! Agent failures carry the agent they came from so the run's error state
//! names the culprit.

use crate::agents::AgentKind;
use crate::decode::DecodeError;
use crate::llm::GenerationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent}: {source}")]
    Generation {
        agent: AgentKind,
        #[source]
        source: GenerationError,
    },

    #[error("{agent}: could not parse response: {source}")]
    Decode {
        agent: AgentKind,
        #[source]
        source: DecodeError,
    },
}

impl AgentError {
    pub fn agent(&self) -> AgentKind {
        match self {
            AgentError::Generation { agent, .. } | AgentError::Decode { agent, .. } => *agent,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AgentError::Generation {
                source: GenerationError::Cancelled,
                ..
            }
        )
    }
}

/// Fatal run failures
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("project memory unavailable: {0}")]
    Memory(String),

    #[error("workspace scan failed: {0}")]
    Scan(String),

    #[error("worker task aborted: {0}")]
    Worker(String),

    #[error("run cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            OrchestratorError::Cancelled => true,
            OrchestratorError::Agent(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_names_agent() {
        let err = AgentError::Generation {
            agent: AgentKind::FeatureDev,
            source: GenerationError::RateLimited("429".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("feature_dev"));
        assert!(msg.contains("rate limited"));
        assert_eq!(err.agent(), AgentKind::FeatureDev);
    }

    #[test]
    fn test_cancelled_detection() {
        let err: OrchestratorError = AgentError::Generation {
            agent: AgentKind::Architect,
            source: GenerationError::Cancelled,
        }
        .into();
        assert!(err.is_cancelled());
        assert!(!OrchestratorError::Memory("x".into()).is_cancelled());
    }
}
