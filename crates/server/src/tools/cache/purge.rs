//! cache_purge tool implementation.
//!
//! Purges a whole partition, entries by URL pattern, or trims to a count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stacks_client::OfflineLayer;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete this partition and all its entries, e.g. "stacks-thumbnails-v1".
    pub partition: Option<String>,

    /// Delete entries whose URL contains this pattern.
    pub url_pattern: Option<String>,

    /// Keep only the newest N entries.
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Whether the named partition existed and was removed.
    pub partition_deleted: bool,
    /// Number of entries deleted by pattern or count.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(layer: &OfflineLayer, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.partition.is_none() && params.url_pattern.is_none() && params.max_entries.is_none() {
        return Err(ToolError::InvalidInput(
            "At least one of partition, url_pattern, or max_entries must be specified".to_string(),
        )
        .into());
    }
    if params.url_pattern.as_deref().is_some_and(str::is_empty) {
        return Err(ToolError::InvalidInput("url_pattern cannot be empty".to_string()).into());
    }

    let db = &layer.context().db;
    let mut output = CachePurgeOutput { partition_deleted: false, deleted: 0 };

    if let Some(partition) = params.partition {
        output.partition_deleted = db.delete_partition(&partition).await?;
    }

    if let Some(pattern) = params.url_pattern {
        output.deleted += db.purge_entries_by_url(&pattern).await?;
    }

    if let Some(max_entries) = params.max_entries {
        output.deleted += db.purge_oldest_entries(max_entries).await?;
    }

    tracing::info!(partition_deleted = output.partition_deleted, deleted = output.deleted, "cache purged");
    json_result(&output)
}
