//! # Tile Proxy
//!
//! A caching proxy for slippy-map imagery tiles.
//!
//! Map clients request tiles by `zoom/x/y`. The proxy serves them from a
//! local SQLite store when it can, and otherwise fetches them once from a
//! configurable upstream imagery server, persists them and replies. A bulk
//! download queue pre-warms the store for whole regions so maps keep working
//! when the upstream is unreachable.
//!
//! ## Features
//!
//! - **Read-through caching**: hot tiles in memory, every tile on disk
//! - **Region pre-warming**: sequential, cancellable, polite bulk downloads
//! - **Deduplication**: tiles already stored are never fetched again
//! - **Retention**: optional age-based sweep of stored tiles
//!
//! ## Architecture
//!
//! - [`tile`] - Tile coordinates, Web Mercator math, LRU cache, tile service
//! - [`store`] - SQLite tile persistence
//! - [`source`] - Upstream tile sources
//! - [`download`] - Bulk download jobs and their runner
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_proxy::{
//!     create_router, DownloadQueue, HttpTileSource, QueueConfig, RouterConfig, TileService,
//!     TileStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TileStore::open("tiles.db").await?;
//!     store.ensure_schema().await?;
//!
//!     let source = Arc::new(HttpTileSource::new(
//!         "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
//!     )?);
//!     let queue = DownloadQueue::start(store.clone(), Arc::clone(&source), QueueConfig::default());
//!     let router = create_router(TileService::new(store, source), queue, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:6565").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod server;
pub mod source;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use download::{DownloadJob, DownloadQueue, DownloadRequest, JobStatus, QueueConfig};
pub use error::{FetchError, JobError, StoreError};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use source::{HttpTileSource, TileSource};
pub use store::TileStore;
pub use tile::{
    deg_to_tile, expand_region, tile_footprint_km, BoundedCache, TileCoord, TileOrigin,
    TileResponse, TileService,
};
