//! Capabilities exposed to the agent during tool-augmented calls.

use serde::Deserialize;
use serde_json::json;

use crate::credentials::BackendCredentials;
use crate::error::AgentError;
use crate::inventory::{clamp_page_size, RemoteInventory, MAX_PAGE_SIZE};
use crate::types::{ToolCall, ToolDefinition};
use crate::Result;

/// Name of the paginated remote listing capability.
pub const LIST_REMOTE_RESOURCES: &str = "list_remote_resources";

/// Function definition advertised to the agent.
pub fn list_remote_resources_definition(default_page_size: u32) -> ToolDefinition {
    ToolDefinition::function(
        LIST_REMOTE_RESOURCES,
        "List the resources that exist in the remote backend account. Results are \
         paginated; keep requesting the next page until has_more is false.",
        json!({
            "type": "object",
            "properties": {
                "page": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Page number, starting at 1."
                },
                "page_size": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_PAGE_SIZE,
                    "default": clamp_page_size(default_page_size),
                    "description": "Items per page."
                }
            },
            "required": ["page"]
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
}

/// Execute one tool call and return the JSON text handed back to the agent.
pub async fn invoke_tool(
    inventory: &dyn RemoteInventory,
    credentials: &BackendCredentials,
    call: &ToolCall,
    default_page_size: u32,
) -> Result<String> {
    let tool = call.function.name.as_str();
    if tool != LIST_REMOTE_RESOURCES {
        return Err(AgentError::ToolInvocationFailed {
            tool: tool.to_string(),
            message: "unknown tool".to_string(),
        });
    }

    let raw_args = call.function.arguments.trim();
    let args: ListArgs = if raw_args.is_empty() {
        ListArgs::default()
    } else {
        serde_json::from_str(raw_args).map_err(|e| AgentError::ToolInvocationFailed {
            tool: tool.to_string(),
            message: format!("malformed arguments: {e}"),
        })?
    };

    let page = args.page.unwrap_or(1).max(1);
    let page_size = clamp_page_size(args.page_size.unwrap_or(default_page_size));

    let listed = inventory
        .list_page(credentials, page, page_size)
        .await
        .map_err(|e| AgentError::ToolInvocationFailed {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

    Ok(serde_json::to_string(&listed)?)
}
