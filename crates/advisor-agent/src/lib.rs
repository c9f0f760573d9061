//! Advisor-Agent: Reasoning Agent Client for the IaC Advisor
//!
//! This crate talks to the external reasoning agent and exposes the one
//! capability the agent may call back into: a paginated listing of the
//! resources held by the remote backend.
//!
//! ## Layer 1 - Agent Transport
//!
//! Focus: two call modes (plain prompt and tool-augmented prompt), a
//! read-only remote listing, and a failure taxonomy the orchestrator can
//! fold into partial reports. Nothing here retries.

pub mod client;
pub mod credentials;
pub mod error;
pub mod fakes;
pub mod inventory;
pub mod tools;
pub mod types;

pub use client::{AgentConfig, OpenAiCompatibleAgent, ReasoningAgent, UnavailableAgent};
pub use credentials::BackendCredentials;
pub use error::AgentError;
pub use inventory::{
    clamp_page_size, list_all_remote, HttpRemoteInventory, RemoteInventory, RemotePage,
    RemoteResource, DEFAULT_PAGE_SIZE, DEFAULT_REMOTE_RESOURCE_TYPE, MAX_PAGE_SIZE,
};
pub use tools::{invoke_tool, list_remote_resources_definition, LIST_REMOTE_RESOURCES};

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
