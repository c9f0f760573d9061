//! Reasoning agent client.
//!
//! Two call modes: [`ReasoningAgent::query`] is a single prompt-to-text call,
//! [`ReasoningAgent::query_with_tools`] lets the agent call
//! `list_remote_resources` any number of times before it answers. Neither
//! retries; the caller decides what a failure means.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, instrument};

use crate::credentials::BackendCredentials;
use crate::error::AgentError;
use crate::inventory::{RemoteInventory, DEFAULT_PAGE_SIZE};
use crate::tools::{invoke_tool, list_remote_resources_definition};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role};
use crate::Result;

/// Abstraction over the external reasoning agent.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Single-shot prompt to text.
    async fn query(&self, prompt: &str) -> Result<String>;

    /// Multi-turn call in which the agent may page through the remote
    /// inventory using `credentials` before producing its final answer.
    async fn query_with_tools(
        &self,
        prompt: &str,
        credentials: &BackendCredentials,
    ) -> Result<String>;
}

/// Agent service settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`)
    pub api_base: String,
    /// Bearer token for the agent service
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Maximum number of tool rounds before giving up
    pub max_tool_rounds: usize,
    /// Page size suggested to the agent for remote listing
    pub page_size: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            request_timeout_ms: 120_000,
            max_tool_rounds: 16,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AgentConfig {
    /// Create config for a specific endpoint
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        AgentConfig {
            api_base: api_base.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleAgent {
    client: reqwest::Client,
    config: AgentConfig,
    inventory: Arc<dyn RemoteInventory>,
}

impl OpenAiCompatibleAgent {
    /// Create a client. `inventory` backs the `list_remote_resources` tool.
    pub fn new(config: AgentConfig, inventory: Arc<dyn RemoteInventory>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
                .map_err(|e| AgentError::InvalidResponse(format!("invalid API key header: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("iac-advisor/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            inventory,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<Choice> {
        let response = self
            .client
            .post(self.completions_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::InvalidResponse(format!("unparseable completion: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::InvalidResponse("completion has no choices".to_string()))
    }
}

/// Extract the final answer from a choice, treating refusals as errors.
///
/// An empty answer is valid: the diff task legitimately answers with nothing
/// when there is nothing to add.
fn final_text(choice: Choice) -> Result<String> {
    if let Some(refusal) = choice.message.refusal {
        return Err(AgentError::Refused(refusal));
    }
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(AgentError::Refused(
            "response blocked by content filter".to_string(),
        ));
    }
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl ReasoningAgent for OpenAiCompatibleAgent {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn query(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            tools: Vec::new(),
            temperature: None,
        };
        let choice = self.complete(&request).await?;
        final_text(choice)
    }

    #[instrument(skip_all, fields(model = %self.config.model, api_id = %credentials.api_id))]
    async fn query_with_tools(
        &self,
        prompt: &str,
        credentials: &BackendCredentials,
    ) -> Result<String> {
        let mut request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            tools: vec![list_remote_resources_definition(self.config.page_size)],
            temperature: None,
        };

        for round in 0..=self.config.max_tool_rounds {
            let choice = self.complete(&request).await?;
            if choice.message.tool_calls.is_empty() {
                return final_text(choice);
            }

            debug!(
                round = round,
                calls = choice.message.tool_calls.len(),
                "agent requested tool calls"
            );

            let calls = choice.message.tool_calls.clone();
            request.messages.push(ChatMessage {
                role: Role::Assistant,
                ..choice.message
            });
            for call in &calls {
                let output = invoke_tool(
                    self.inventory.as_ref(),
                    credentials,
                    call,
                    self.config.page_size,
                )
                .await?;
                request
                    .messages
                    .push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        Err(AgentError::ToolRoundsExhausted {
            rounds: self.config.max_tool_rounds,
        })
    }
}

/// Stand-in for an agent client that could not be configured.
///
/// Every call fails with the configuration problem, so each task degrades to
/// an empty section instead of the whole cycle aborting.
#[derive(Debug, Clone)]
pub struct UnavailableAgent {
    missing_key: bool,
    reason: String,
}

impl UnavailableAgent {
    pub fn new(cause: &AgentError) -> Self {
        Self {
            missing_key: matches!(cause, AgentError::MissingApiKey),
            reason: cause.to_string(),
        }
    }

    fn error(&self) -> AgentError {
        if self.missing_key {
            AgentError::MissingApiKey
        } else {
            AgentError::Transport(self.reason.clone())
        }
    }
}

#[async_trait]
impl ReasoningAgent for UnavailableAgent {
    async fn query(&self, _prompt: &str) -> Result<String> {
        Err(self.error())
    }

    async fn query_with_tools(
        &self,
        _prompt: &str,
        _credentials: &BackendCredentials,
    ) -> Result<String> {
        Err(self.error())
    }
}
