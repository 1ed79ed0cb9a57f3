//! layer_install, layer_activate and layer_status tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stacks_client::{InterceptionHandler, OfflineLayer};
use stacks_core::PartitionInfo;

use super::json_result;

/// Output structure for layer_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerStatusOutput {
    pub version: String,
    /// idle, installed or active.
    pub phase: String,
    /// Partitions the running version owns.
    pub expected_partitions: Vec<String>,
    /// Every partition currently in the store, including superseded ones.
    pub partitions: Vec<PartitionInfo>,
}

/// Pre-warm the current version. Fails without writing if any entry fails.
pub async fn install_impl(layer: &OfflineLayer) -> Result<CallToolResult, McpError> {
    let report = layer.on_install().await?;
    json_result(&report)
}

pub async fn activate_impl(layer: &OfflineLayer) -> Result<CallToolResult, McpError> {
    let report = layer.on_activate().await?;
    json_result(&report)
}

pub async fn status_impl(layer: &OfflineLayer) -> Result<CallToolResult, McpError> {
    let ctx = layer.context();
    let output = LayerStatusOutput {
        version: ctx.version().to_string(),
        phase: layer.phase().as_str().to_string(),
        expected_partitions: ctx.expected_partitions(),
        partitions: ctx.db.list_partitions().await?,
    };
    json_result(&output)
}
