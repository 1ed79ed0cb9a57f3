//! Errors raised by the tool layer itself.
//!
//! Layer and storage failures arrive as `stacks_core::Error` and map through
//! its own conversion; these cover what only the server can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool parameters failed validation.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A spawned background task panicked or was cancelled.
    #[error("TASK_FAILED: {0}")]
    TaskFailed(String),

    /// Tool output could not be encoded.
    #[error("ENCODE_FAILED: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::TaskFailed(_) | ToolError::Encode(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
