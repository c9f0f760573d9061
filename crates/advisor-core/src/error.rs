//! Error taxonomy for the advisory cycle.
//!
//! Only [`AdvisorError::ExecutionDirUnresolvable`] aborts a cycle. Collection
//! errors degrade to empty inputs and task errors degrade to empty report
//! segments; both are still represented here so they can be logged and
//! asserted on.

use std::path::PathBuf;

use advisor_agent::AgentError;

/// Errors produced by the advisory engine.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("state snapshot {} is unreadable: {source}", path.display())]
    StateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state snapshot {} is malformed: {source}", path.display())]
    StateMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration source {} is unreadable: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reference documentation {} is unreadable: {source}", path.display())]
    DocsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("execution directory {} cannot be resolved: {reason}", path.display())]
    ExecutionDirUnresolvable { path: PathBuf, reason: String },

    #[error("prompt template error: {0}")]
    Template(String),

    #[error("task {task} requires input '{input}'")]
    MissingInput { task: String, input: String },

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("task {task} timed out after {timeout_ms}ms")]
    TaskTimeout { task: String, timeout_ms: u64 },

    #[error("report rendering failed: {0}")]
    RenderFailed(String),
}

/// Result type for advisory engine operations.
pub type Result<T> = std::result::Result<T, AdvisorError>;
