//! Tile service for the on-demand fetch-and-cache path.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Hot-tile cache    3. Fetch upstream on miss         │    │
//! │  │  2. Tile store        4. Persist, cache & return        │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌──────────────┐     ┌────────────┐      ┌────────────┐      │
//! │    │ BoundedCache │     │ TileStore  │      │ TileSource │      │
//! │    └──────────────┘     └────────────┘      └────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One request makes at most one upstream attempt. Store failures never
//! surface to the caller: a failed read falls through to the network and a
//! failed write only means the tile is not cached on disk.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::source::TileSource;
use crate::store::TileStore;

use super::cache::{BoundedCache, DEFAULT_TILE_CACHE_CAPACITY};
use super::coord::TileCoord;

/// Where a served tile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    /// In-memory hot-tile cache
    Memory,
    /// Persistent tile store
    Store,
    /// Fetched from the upstream source for this request
    Upstream,
}

impl TileOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileOrigin::Memory => "memory",
            TileOrigin::Store => "store",
            TileOrigin::Upstream => "miss",
        }
    }
}

impl fmt::Display for TileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tile ready to be served.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded image bytes
    pub data: Bytes,

    /// Which layer produced the tile
    pub origin: TileOrigin,
}

/// Serves single tiles from memory, disk or upstream.
pub struct TileService<S: TileSource> {
    store: TileStore,
    source: Arc<S>,
    cache: Mutex<BoundedCache<TileCoord, Bytes>>,
}

impl<S: TileSource> TileService<S> {
    /// Create a service with the default hot-tile cache capacity.
    pub fn new(store: TileStore, source: Arc<S>) -> Self {
        Self::with_cache_capacity(store, source, DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a service holding up to `capacity` tiles in memory.
    pub fn with_cache_capacity(store: TileStore, source: Arc<S>, capacity: usize) -> Self {
        Self {
            store,
            source,
            cache: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    /// Get a tile, fetching and persisting it on a miss.
    ///
    /// Only an upstream failure is an error; it is returned untouched so the
    /// caller can report the upstream reason.
    pub async fn get_tile(&self, coord: TileCoord) -> Result<TileResponse, FetchError> {
        if let Some(data) = self.cache.lock().await.get(&coord).cloned() {
            return Ok(TileResponse {
                data,
                origin: TileOrigin::Memory,
            });
        }

        match self.store.get_tile(coord.zoom, coord.x, coord.y).await {
            Ok(Some(blob)) => {
                let data = Bytes::from(blob);
                self.cache.lock().await.put(coord, data.clone());
                return Ok(TileResponse {
                    data,
                    origin: TileOrigin::Store,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(%coord, "Tile store read failed, fetching upstream: {}", e),
        }

        let data = self.source.fetch(coord).await?;
        debug!(%coord, bytes = data.len(), "Fetched tile from upstream");

        if !self.store.save_tile(coord.zoom, coord.x, coord.y, &data).await {
            warn!(%coord, "Serving tile without persisting it");
        }
        self.cache.lock().await.put(coord, data.clone());

        Ok(TileResponse {
            data,
            origin: TileOrigin::Upstream,
        })
    }

    /// Number of tiles currently held in memory.
    pub async fn cached_tiles(&self) -> usize {
        self.cache.lock().await.len()
    }
}
