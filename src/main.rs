//! Tile Proxy - a caching proxy for slippy-map imagery.
//!
//! This binary opens the tile store, starts the download runner and serves
//! the HTTP API until Ctrl-C or SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_proxy::{
    config::Config,
    download::DownloadQueue,
    server::{create_router, RouterConfig},
    source::HttpTileSource,
    store::TileStore,
    tile::TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Tile Proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Database: {}", config.db_filename);
    info!("  Upstream: {}", config.tile_source_url);
    info!("  Upstream timeout: {}s", config.upstream_timeout_secs);
    info!("  Download delay: {}ms", config.download_delay_ms);
    info!("  Cache: {} tiles in memory", config.cache_tiles);

    let store = match TileStore::open(&config.db_filename).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open tile database {}: {}", config.db_filename, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = store.ensure_schema().await {
        error!("Failed to prepare tile database schema: {}", e);
        return ExitCode::FAILURE;
    }

    match store.tile_count().await {
        Ok(count) => info!("  Stored tiles: {}", count),
        Err(e) => warn!("Could not count stored tiles: {}", e),
    }

    if let Some(days) = config.retention_days {
        let removed = store.cleanup_old_tiles(days).await;
        info!("Retention sweep removed {} tile(s) older than {} days", removed, days);
    }

    let source = match HttpTileSource::with_timeout(
        config.tile_source_url.clone(),
        config.upstream_timeout(),
    ) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("Failed to create upstream client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let queue = DownloadQueue::start(store.clone(), Arc::clone(&source), config.queue_config());
    let tile_service = TileService::with_cache_capacity(store.clone(), source, config.cache_tiles);

    let router_config = RouterConfig::default()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);
    let router = create_router(tile_service, queue.clone(), router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            queue.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/tiles/0/0/0 -o tile.png", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Stopping download runner");
    queue.shutdown().await;
    store.close().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_proxy=debug,tower_http=debug"
    } else {
        "tile_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
