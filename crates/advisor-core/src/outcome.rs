//! Per-task results and failure classification.

use advisor_agent::AgentError;
use serde::Serialize;

use crate::error::AdvisorError;
use crate::tasks::TaskKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport or service-level error.
    AgentCallFailed,
    AgentRefused,
    ToolInvocationFailed,
    Timeout,
    /// The prompt could not be built.
    Prompt,
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&AdvisorError> for TaskFailure {
    fn from(err: &AdvisorError) -> Self {
        let kind = match err {
            AdvisorError::Agent(AgentError::Refused(_)) => FailureKind::AgentRefused,
            AdvisorError::Agent(AgentError::ToolInvocationFailed { .. })
            | AdvisorError::Agent(AgentError::ToolRoundsExhausted { .. }) => {
                FailureKind::ToolInvocationFailed
            }
            AdvisorError::Agent(_) => FailureKind::AgentCallFailed,
            AdvisorError::TaskTimeout { .. } => FailureKind::Timeout,
            AdvisorError::Template(_) | AdvisorError::MissingInput { .. } => FailureKind::Prompt,
            _ => FailureKind::AgentCallFailed,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// The contribution of one task to the report.
///
/// A failed task contributes empty text and records why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub task: TaskKind,
    pub text: String,
    pub failure: Option<TaskFailure>,
    pub duration_ms: u64,
}

impl TaskOutcome {
    pub fn succeeded(task: TaskKind, text: String, duration_ms: u64) -> Self {
        Self {
            task,
            text,
            failure: None,
            duration_ms,
        }
    }

    pub fn failed(task: TaskKind, failure: TaskFailure, duration_ms: u64) -> Self {
        Self {
            task,
            text: String::new(),
            failure: Some(failure),
            duration_ms,
        }
    }

    pub fn from_result(task: TaskKind, result: Result<String, AdvisorError>, duration_ms: u64) -> Self {
        match result {
            Ok(text) => Self::succeeded(task, text, duration_ms),
            Err(e) => Self::failed(task, TaskFailure::from(&e), duration_ms),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
