//! Offline Cache - diagnostics server
//!
//! Hosts an [`OfflineCache`] backed by a directory of JSON files and exposes
//! it over a small HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_cache::api::{create_router, AppState};
use offline_cache::network::TcpProbe;
use offline_cache::store::FileStore;
use offline_cache::{Config, OfflineCache};

/// Main entry point for the offline cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed persistent store
/// 4. Build the cache and start network monitoring
/// 5. Serve the diagnostics API on the configured port
/// 6. Stop network monitoring on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info", can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting offline cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_memory_entries={}, default_ttl={}ms, port={}, poll_interval={}s, cache_dir={}",
        config.max_memory_entries,
        config.default_ttl_ms,
        config.server_port,
        config.network_poll_interval,
        config.cache_dir.display()
    );

    let store = FileStore::open(&config.cache_dir)
        .await
        .with_context(|| format!("failed to open cache dir {}", config.cache_dir.display()))?;
    let probe = TcpProbe::new(config.probe_addr.clone(), config.probe_timeout());

    let cache = OfflineCache::from_config(&config, Arc::new(store), Arc::new(probe));
    cache.initialize().await;

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cache))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the cache's
/// background tasks.
async fn shutdown_signal(cache: OfflineCache) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cache.cleanup();
}
