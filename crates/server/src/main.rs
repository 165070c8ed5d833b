//! isis-mcp server entry point.
//!
//! Boots the retrieval pipeline and serves it over MCP stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use isis_client::RagPipeline;
use isis_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let cached_pages = cache.page_count().await.context("counting cached pages")?;
    let ttl_secs = cache.ttl().num_seconds();
    let pipeline = RagPipeline::from_config(&config, cache).await.context("building retrieval pipeline")?;

    tracing::info!(
        db_path = %config.db_path.display(),
        cached_pages,
        ttl_secs,
        "starting isis-mcp on stdio transport"
    );

    let handler = handler::IsisServer::new(pipeline);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
