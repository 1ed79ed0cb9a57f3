//! stacks-offline server entry point.
//!
//! Boots the offline layer from configuration and serves it as an MCP server
//! on stdio transport. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use stacks_client::OfflineLayer;
use stacks_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let layer = OfflineLayer::from_config(&config).await?;

    tracing::info!(version = %config.version, prewarm = config.prewarm_len(), "Starting stacks-offline server on stdio transport");

    let handler = handler::StacksServer::new(Arc::new(layer));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
