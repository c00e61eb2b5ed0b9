//! Audio node server
//!
//! Usage: `lavanode [config.toml]`

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lavanode::{
    api::{AppState, WebServer},
    cache::CredentialCache,
    config::AppConfig,
    sources::{HttpSourceManager, SourceRegistry},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting lavanode {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(std::env::args().nth(1).map(Into::into))
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let cache = match config.cache.resolved_path() {
        Some(path) => {
            CredentialCache::open(path, config.cache.ttl(), config.cache.flush_debounce())
                .await
                .context("Failed to open credential cache")?
        }
        None => {
            tracing::warn!("No cache path available, credentials will not persist");
            CredentialCache::in_memory(config.cache.ttl())
        }
    };

    // Load phase: everything is registered before the listener opens
    let sources = Arc::new(SourceRegistry::new());
    if config.sources.http {
        let http = HttpSourceManager::new(cache.clone()).context("Failed to build HTTP client")?;
        sources.register(Arc::new(http));
    }
    tracing::info!("Registered source managers: {:?}", sources.names());

    let state = AppState::new(config, sources);
    let sessions = state.sessions.clone();
    let server = WebServer::new(state);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down...");
        })
        .await
        .context("Server failed")?;

    tracing::info!("Closed {} sessions", sessions.close_all());
    cache.shutdown().await.context("Failed to flush credential cache")?;

    tracing::info!("Stopped");
    Ok(())
}
