//! # Geocode Cache - Main Entry Point
//!
//! Loads configuration, connects the cache store, and serves the cache admin
//! endpoints until SIGINT or SIGTERM.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use geocode_cache::caching::{CacheAdminRouter, CacheAdminState};
use geocode_cache::observability::init_logging;
use geocode_cache::{CacheManager, GeocacheConfig, GeocacheError, GeocacheResult};

#[tokio::main]
async fn main() -> GeocacheResult<()> {
    let config = GeocacheConfig::load().await?;
    init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting geocode cache");

    let manager = Arc::new(CacheManager::new(config.cache.clone()));
    if !manager.init().await {
        warn!(
            backend = config.cache.backend.name(),
            "Cache store unavailable at startup, lookups will bypass the cache"
        );
    }

    let addr = config.bind_address()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GeocacheError::config(format!("Failed to bind {}: {}", addr, e)))?;
    info!(%addr, "Cache admin interface listening");

    let app = CacheAdminRouter::create_router(CacheAdminState::new(manager.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.close().await;
    info!("Geocode cache shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
