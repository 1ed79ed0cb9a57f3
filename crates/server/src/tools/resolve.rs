//! offline_fetch tool implementation.
//!
//! Runs one request through the interception layer exactly as the host
//! would and reports which path answered it.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stacks_client::{InterceptionHandler, OfflineLayer};
use stacks_core::RequestDescriptor;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute URL or path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers, e.g. `Accept` or `Authorization`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    /// Route category, e.g. "api-data".
    pub category: String,
    /// One of network, cache, stale-cache, synthesized, passthrough.
    pub source: String,
    pub status: u16,
    /// Response headers in received order; repeated names stay separate.
    pub headers: Vec<HeaderPair>,
    /// When the snapshot was captured (RFC 3339).
    pub captured_at: String,
    pub body_bytes: usize,
    /// Body as text when it is valid UTF-8.
    pub body: Option<String>,
}

/// One response header. Bytes that are not UTF-8 are replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// Implementation of the offline_fetch tool.
pub async fn offline_fetch_impl(layer: &OfflineLayer, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let mut request = RequestDescriptor::new(&params.method, params.url);
    for (name, value) in &params.headers {
        request = request.try_header(name, value)?;
    }

    let resolution = layer.resolve(&request).await;
    tracing::debug!(
        url = %request.url,
        category = %resolution.category,
        source = resolution.source.as_str(),
        status = resolution.response.status,
        "resolved"
    );

    let response = resolution.response;
    let output = OfflineFetchOutput {
        category: resolution.category.as_str().to_string(),
        source: resolution.source.as_str().to_string(),
        status: response.status,
        headers: response
            .headers
            .iter()
            .map(|(name, value)| HeaderPair {
                name: name.as_str().to_string(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect(),
        captured_at: response.captured_at,
        body_bytes: response.body.len(),
        body: String::from_utf8(response.body).ok(),
    };

    json_result(&output)
}
