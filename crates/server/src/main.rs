//! swcache server entry point.
//!
//! Boots cache storage and the worker, runs install then activate, and serves
//! the worker's fetch interception over MCP on stdio. Logging goes to stderr to
//! avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig, ServiceWorker, Startup};
use swcache_core::{AppConfig, CacheDb};
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

    let config = AppConfig::load()?;
    let scope = config.scope()?;

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = FetchClient::new(FetchConfig::from(&config))?;
    let worker = Arc::new(ServiceWorker::new(scope.clone(), Arc::new(db), Arc::new(fetcher)));

    // the MCP session is the one client this host serves
    worker.registration().open_client(scope.as_str(), None).await;

    match worker.start().await? {
        Startup::Installed { installed, activated } => tracing::info!(
            generation = %installed.generation,
            cached = installed.cached.len(),
            active = activated.is_some(),
            "worker started"
        ),
        Startup::Resumed { install_error } => tracing::warn!(
            generation = %worker.generation(),
            error = %install_error,
            "worker started offline from existing cache"
        ),
    }

    tracing::info!(scope = %scope, "Starting swcache server on stdio transport");

    let handler = handler::SwCacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
