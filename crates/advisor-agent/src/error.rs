//! Error types for advisor-agent

use thiserror::Error;

/// Errors that can occur while talking to the reasoning agent or the backend
#[derive(Error, Debug)]
pub enum AgentError {
    /// No API key configured for the agent service
    #[error("missing API key for the reasoning agent")]
    MissingApiKey,

    /// Transport-level failure (connect, timeout, body read)
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the agent service or the backend
    #[error("service returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The service answered with a payload we cannot interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The agent declined to answer
    #[error("agent refused: {0}")]
    Refused(String),

    /// A capability call requested by the agent failed
    #[error("tool '{tool}' invocation failed: {message}")]
    ToolInvocationFailed { tool: String, message: String },

    /// The agent kept calling tools past the configured round limit
    #[error("agent did not produce an answer within {rounds} tool rounds")]
    ToolRoundsExhausted { rounds: usize },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_contains_body() {
        let err = AgentError::HttpStatus {
            status: 503,
            body: "upstream unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("upstream unavailable"));
    }
}
