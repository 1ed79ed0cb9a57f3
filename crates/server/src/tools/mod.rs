//! MCP tool implementations.
//!
//! This module contains all tools exposed by the stacks-offline server.

pub mod cache;
pub mod lifecycle;
pub mod resolve;
pub mod sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Pretty JSON text content, the shape every tool answers with.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
