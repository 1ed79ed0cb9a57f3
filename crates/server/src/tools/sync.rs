//! connectivity_restored tool implementation.
//!
//! Reconciliation runs on its own task. By default the tool waits for the
//! report; with `wait = false` it returns as soon as the task is spawned.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stacks_client::{OfflineLayer, ReconcileOutcome};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for connectivity_restored tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectivityParams {
    /// Wait for reconciliation to finish (default: true).
    #[serde(default = "default_true")]
    pub wait: bool,
}

fn default_true() -> bool {
    true
}

/// Output structure for connectivity_restored tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectivityOutput {
    /// complete, partial, failed, or scheduled when not waiting.
    pub status: String,
    pub refreshed: usize,
    pub failed: usize,
    /// Per-entry results; empty when not waiting.
    #[schemars(with = "Vec<serde_json::Value>")]
    pub outcomes: Vec<ReconcileOutcome>,
}

pub async fn connectivity_impl(layer: &OfflineLayer, params: ConnectivityParams) -> Result<CallToolResult, McpError> {
    let handle = layer.spawn_reconciliation();
    if !params.wait {
        let output = ConnectivityOutput { status: "scheduled".into(), refreshed: 0, failed: 0, outcomes: Vec::new() };
        return json_result(&output);
    }

    let report = handle
        .await
        .map_err(|e| ToolError::TaskFailed(format!("reconciliation task: {e}")))?;

    let status = if report.is_complete() {
        "complete"
    } else if report.is_partial() {
        "partial"
    } else {
        "failed"
    };

    let output = ConnectivityOutput {
        status: status.into(),
        refreshed: report.refreshed(),
        failed: report.failed(),
        outcomes: report.outcomes,
    };
    json_result(&output)
}
