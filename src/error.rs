//! Error types for agent-skills
//!
//! Centralized error handling using thiserror. Only orchestration failures
//! live here; tool failures never leave the tool registry.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors that abort a whole agent run
#[derive(Debug, Error)]
pub enum AgentError {
    /// Blank user input
    #[error("input is empty")]
    EmptyInput,

    /// Turn budget used up without a final answer
    #[error("max turns ({max_turns}) exceeded without a final response")]
    BudgetExhausted { max_turns: u32 },

    /// Model produced neither text nor tool calls
    #[error("model returned an empty response on turn {turn}")]
    EmptyResponse { turn: u32 },

    /// Caller cancelled the run
    #[error("run cancelled")]
    Cancelled,

    /// Completion model failure
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhausted_error() {
        let err = AgentError::BudgetExhausted { max_turns: 3 };
        assert_eq!(err.to_string(), "max turns (3) exceeded without a final response");
    }

    #[test]
    fn test_empty_response_error() {
        let err = AgentError::EmptyResponse { turn: 2 };
        assert_eq!(err.to_string(), "model returned an empty response on turn 2");
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: AgentError = LlmError::EmptyResponse.into();
        assert!(matches!(err, AgentError::Llm(_)));
        assert_eq!(err.to_string(), "LLM error: no response choices returned");
    }

    #[test]
    fn test_config_error_message() {
        let err = AgentError::Config("llm.model must not be empty".to_string());
        assert_eq!(err.to_string(), "Config error: llm.model must not be empty");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(AgentError::Cancelled)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
