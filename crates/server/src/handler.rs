//! MCP server handler implementation.
//!
//! This module defines the main server handler that acts as the host runtime
//! for the offline layer and routes tool calls to the appropriate
//! implementations.

use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::lifecycle::{activate_impl, install_impl, status_impl};
use crate::tools::resolve::{OfflineFetchParams, offline_fetch_impl};
use crate::tools::sync::{ConnectivityParams, connectivity_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use stacks_client::OfflineLayer;

/// The main MCP server handler for stacks-offline.
#[derive(Clone)]
pub struct StacksServer {
    layer: Arc<OfflineLayer>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl StacksServer {
    pub fn new(layer: Arc<OfflineLayer>) -> Self {
        Self { layer, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Resolve a request through the offline layer. Returns the response and whether it came from the network, the cache, or was synthesized."
    )]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        offline_fetch_impl(&self.layer, params.0).await
    }

    #[tool(description = "Install the configured version: create its partitions and pre-warm them. All-or-nothing.")]
    async fn layer_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.layer).await
    }

    #[tool(description = "Activate the installed version: delete superseded partitions and start serving.")]
    async fn layer_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.layer).await
    }

    #[tool(description = "Report the layer version, lifecycle phase and stored partitions.")]
    async fn layer_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.layer).await
    }

    #[tool(description = "Signal that connectivity is back. Refreshes the reconciliation set in the background.")]
    async fn connectivity_restored(&self, params: Parameters<ConnectivityParams>) -> Result<CallToolResult, McpError> {
        connectivity_impl(&self.layer, params.0).await
    }

    #[tool(description = "Look up stored snapshots for a request by method and URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.layer, params.0).await
    }

    #[tool(description = "Purge a partition, entries matching a URL pattern, or all but the newest N entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.layer, params.0).await
    }
}

impl ServerHandler for StacksServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "stacks-offline".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
