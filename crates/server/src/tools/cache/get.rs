//! cache_get tool implementation.
//!
//! Looks up stored snapshots for a request across every partition.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stacks_client::OfflineLayer;
use stacks_core::{Error, RequestDescriptor, Snapshot};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// One stored entry, body omitted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachedEntry {
    pub partition: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub captured_at: String,
    pub body_bytes: usize,
}

impl From<Snapshot> for CachedEntry {
    fn from(snapshot: Snapshot) -> Self {
        let response = snapshot.response;
        Self {
            partition: snapshot.partition,
            url: snapshot.url,
            status: response.status,
            content_type: response.content_type().map(str::to_string),
            captured_at: response.captured_at,
            body_bytes: response.body.len(),
        }
    }
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The cache key the request maps to.
    pub key: String,
    /// Matching entries, newest first.
    pub entries: Vec<CachedEntry>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(layer: &OfflineLayer, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let ctx = layer.context();
    let request = RequestDescriptor::new(&params.method, params.url);
    let url = ctx.resolve_url(&request.url)?;
    let key = ctx.cache_key(&request, &url);

    let snapshots = ctx.db.find_snapshots(&key).await?;
    if snapshots.is_empty() {
        return Err(Error::CacheMiss(url.to_string()).into());
    }

    let output = CacheGetOutput { key, entries: snapshots.into_iter().map(CachedEntry::from).collect() };
    json_result(&output)
}
