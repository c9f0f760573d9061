//! Remote inventory listing.
//!
//! The backend holds the actual resource set; it is only discoverable through
//! a paginated, read-only listing. The reasoning agent reaches it through the
//! `list_remote_resources` tool, and the direct diff mode pages through it
//! with [`list_all_remote`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::BackendCredentials;
use crate::error::AgentError;
use crate::Result;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the backend accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resource type assigned to items returned by the sites listing.
pub const DEFAULT_REMOTE_RESOURCE_TYPE: &str = "incapsula_site_v3";

/// One resource as held by the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteResource {
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl RemoteResource {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One page of the remote listing. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePage {
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<RemoteResource>,
    pub has_more: bool,
}

/// Read-only, paginated listing of the remote inventory.
#[async_trait]
pub trait RemoteInventory: Send + Sync {
    async fn list_page(
        &self,
        credentials: &BackendCredentials,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage>;
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_PAGE_SIZE)
}

/// Walk pages `1..=max_pages` until the backend reports no more items.
///
/// Stops early (with a warning) when `max_pages` is reached while the
/// backend still reports more data.
pub async fn list_all_remote(
    inventory: &dyn RemoteInventory,
    credentials: &BackendCredentials,
    page_size: u32,
    max_pages: u32,
) -> Result<Vec<RemoteResource>> {
    let page_size = clamp_page_size(page_size);
    let mut resources = Vec::new();

    for page_number in 1..=max_pages.max(1) {
        let page = inventory
            .list_page(credentials, page_number, page_size)
            .await?;
        debug!(
            page = page_number,
            items = page.items.len(),
            has_more = page.has_more,
            "fetched remote inventory page"
        );
        resources.extend(page.items);
        if !page.has_more {
            return Ok(resources);
        }
    }

    warn!(
        max_pages = max_pages,
        collected = resources.len(),
        "remote listing still had more pages; stopping at page limit"
    );
    Ok(resources)
}

/// Sites listing over the backend's v3 REST API.
pub struct HttpRemoteInventory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteInventory {
    /// Create a listing client rooted at `base_url` (the `base_url_api` endpoint).
    pub fn new(base_url: &str, request_timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("iac-advisor/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn sites_url(&self) -> String {
        format!(
            "{}/sites-mgmt/v3/sites",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RemoteInventory for HttpRemoteInventory {
    async fn list_page(
        &self,
        credentials: &BackendCredentials,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage> {
        let page_size = clamp_page_size(page_size);
        let response = self
            .client
            .get(self.sites_url())
            .header("x-API-Id", &credentials.api_id)
            .header("x-API-Key", &credentials.api_key)
            .query(&[
                ("pageNumber", page.to_string()),
                ("pageSize", page_size.to_string()),
            ])
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

        let payload: Value = serde_json::from_str(&body)?;
        parse_sites_page(&payload, DEFAULT_REMOTE_RESOURCE_TYPE, page, page_size)
    }
}

fn parse_sites_page(
    payload: &Value,
    resource_type: &str,
    page: u32,
    page_size: u32,
) -> Result<RemotePage> {
    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::InvalidResponse("sites listing has no data array".into()))?;

    let items: Vec<RemoteResource> = data
        .iter()
        .filter_map(|entry| {
            let id = match entry.get("id")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(RemoteResource::new(resource_type, id, name))
        })
        .collect();

    Ok(RemotePage {
        page,
        page_size,
        has_more: data.len() as u32 >= page_size,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticRemoteInventory;
    use serde_json::json;

    #[test]
    fn test_clamp_page_size_bounds() {
        assert_eq!(clamp_page_size(0), 1);
        assert_eq!(clamp_page_size(50), 50);
        assert_eq!(clamp_page_size(1_000), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_parse_sites_page_accepts_numeric_and_string_ids() {
        let payload = json!({
            "data": [
                {"id": 101, "name": "shop.example.com"},
                {"id": "202", "name": "blog.example.com"},
                {"name": "no-id.example.com"}
            ]
        });
        let page = parse_sites_page(&payload, "incapsula_site_v3", 1, 10).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "101");
        assert_eq!(page.items[1].id, "202");
        assert!(!page.has_more);
    }

    #[test]
    fn test_parse_sites_page_full_page_has_more() {
        let payload = json!({"data": [{"id": 1}, {"id": 2}]});
        let page = parse_sites_page(&payload, "t", 3, 2).unwrap();
        assert!(page.has_more);
        assert_eq!(page.page, 3);
    }

    #[test]
    fn test_parse_sites_page_without_data_is_invalid() {
        let err = parse_sites_page(&json!({"errors": []}), "t", 1, 10).unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_list_all_remote_exhausts_pages() {
        let items: Vec<RemoteResource> = (0..7)
            .map(|i| RemoteResource::new("site", i.to_string(), format!("site-{i}")))
            .collect();
        let inventory = StaticRemoteInventory::new(items.clone());

        let all = list_all_remote(&inventory, &BackendCredentials::default(), 3, 10)
            .await
            .unwrap();

        assert_eq!(all, items);
        assert_eq!(inventory.pages_served(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_all_remote_respects_page_limit() {
        let items: Vec<RemoteResource> = (0..10)
            .map(|i| RemoteResource::new("site", i.to_string(), ""))
            .collect();
        let inventory = StaticRemoteInventory::new(items);

        let partial = list_all_remote(&inventory, &BackendCredentials::default(), 2, 2)
            .await
            .unwrap();

        assert_eq!(partial.len(), 4);
    }
}
