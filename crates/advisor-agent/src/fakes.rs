//! In-memory fakes for the agent and the remote listing (testing only)
//!
//! Provides `StaticRemoteInventory` and `ScriptedAgent`, which satisfy the
//! trait contracts without any network access.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::ReasoningAgent;
use crate::credentials::BackendCredentials;
use crate::error::AgentError;
use crate::inventory::{list_all_remote, RemoteInventory, RemotePage, RemoteResource};
use crate::Result;

// ---------------------------------------------------------------------------
// StaticRemoteInventory
// ---------------------------------------------------------------------------

/// Remote listing backed by a fixed `Vec`, sliced into pages on demand.
#[derive(Debug, Default)]
pub struct StaticRemoteInventory {
    items: Vec<RemoteResource>,
    failure: Option<String>,
    served: Mutex<Vec<u32>>,
}

impl StaticRemoteInventory {
    pub fn new(items: Vec<RemoteResource>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// A listing whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Page numbers served so far, in call order.
    pub fn pages_served(&self) -> Vec<u32> {
        self.served.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteInventory for StaticRemoteInventory {
    async fn list_page(
        &self,
        _credentials: &BackendCredentials,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage> {
        if let Some(message) = &self.failure {
            return Err(AgentError::HttpStatus {
                status: 401,
                body: message.clone(),
            });
        }
        self.served.lock().unwrap().push(page);

        let size = page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1) * size;
        let end = (start + size).min(self.items.len());
        let items = if start < self.items.len() {
            self.items[start..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(RemotePage {
            page,
            page_size,
            has_more: end < self.items.len(),
            items,
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Fail(String),
    Refuse(String),
    /// Answer with the remote resources missing from the prompt, one id per line.
    ListAndDiff,
}

#[derive(Debug, Clone)]
struct Rule {
    marker: String,
    delay: Duration,
    response: Scripted,
}

/// A reasoning agent that answers from a script keyed by prompt substrings.
///
/// The first rule whose marker occurs in the prompt wins. Delays use
/// `tokio::time::sleep`, so tests can run on a paused clock.
#[derive(Default)]
pub struct ScriptedAgent {
    rules: Vec<Rule>,
    inventory: Option<Box<dyn RemoteInventory>>,
    prompts: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    tool_calls: Mutex<Vec<BackendCredentials>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, marker: &str, text: &str) -> Self {
        self.respond_after(marker, Duration::ZERO, text)
    }

    pub fn respond_after(mut self, marker: &str, delay: Duration, text: &str) -> Self {
        self.rules.push(Rule {
            marker: marker.to_string(),
            delay,
            response: Scripted::Text(text.to_string()),
        });
        self
    }

    pub fn fail(mut self, marker: &str, message: &str) -> Self {
        self.rules.push(Rule {
            marker: marker.to_string(),
            delay: Duration::ZERO,
            response: Scripted::Fail(message.to_string()),
        });
        self
    }

    pub fn refuse(mut self, marker: &str, reason: &str) -> Self {
        self.rules.push(Rule {
            marker: marker.to_string(),
            delay: Duration::ZERO,
            response: Scripted::Refuse(reason.to_string()),
        });
        self
    }

    /// For tool-augmented prompts containing `marker`, page through
    /// `inventory` and answer with the ids absent from the prompt text.
    pub fn diff_against(mut self, marker: &str, inventory: Box<dyn RemoteInventory>) -> Self {
        self.inventory = Some(inventory);
        self.rules.push(Rule {
            marker: marker.to_string(),
            delay: Duration::ZERO,
            response: Scripted::ListAndDiff,
        });
        self
    }

    /// Every prompt received, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Markers of the rules that finished, in completion order.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    /// Credentials passed to each tool-augmented call.
    pub fn tool_call_credentials(&self) -> Vec<BackendCredentials> {
        self.tool_calls.lock().unwrap().clone()
    }

    async fn answer(&self, prompt: &str, credentials: Option<&BackendCredentials>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let rule = self
            .rules
            .iter()
            .find(|rule| prompt.contains(&rule.marker))
            .cloned()
            .ok_or_else(|| AgentError::InvalidResponse("no scripted response".to_string()))?;

        if !rule.delay.is_zero() {
            tokio::time::sleep(rule.delay).await;
        }
        self.completed.lock().unwrap().push(rule.marker.clone());

        match rule.response {
            Scripted::Text(text) => Ok(text),
            Scripted::Fail(message) => Err(AgentError::Transport(message)),
            Scripted::Refuse(reason) => Err(AgentError::Refused(reason)),
            Scripted::ListAndDiff => {
                let (Some(inventory), Some(credentials)) = (&self.inventory, credentials) else {
                    return Err(AgentError::ToolInvocationFailed {
                        tool: crate::tools::LIST_REMOTE_RESOURCES.to_string(),
                        message: "no inventory available".to_string(),
                    });
                };
                let remote = list_all_remote(inventory.as_ref(), credentials, 100, 100)
                    .await
                    .map_err(|e| AgentError::ToolInvocationFailed {
                        tool: crate::tools::LIST_REMOTE_RESOURCES.to_string(),
                        message: e.to_string(),
                    })?;
                let missing: Vec<String> = remote
                    .into_iter()
                    .filter(|r| !prompt.contains(&format!("\"{}\"", r.id)))
                    .map(|r| r.id)
                    .collect();
                Ok(missing.join("\n"))
            }
        }
    }
}

#[async_trait]
impl ReasoningAgent for ScriptedAgent {
    async fn query(&self, prompt: &str) -> Result<String> {
        self.answer(prompt, None).await
    }

    async fn query_with_tools(
        &self,
        prompt: &str,
        credentials: &BackendCredentials,
    ) -> Result<String> {
        self.tool_calls.lock().unwrap().push(credentials.clone());
        self.answer(prompt, Some(credentials)).await
    }
}
