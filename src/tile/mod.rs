//! Tile coordinates, the hot-tile cache and the on-demand tile service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐                       │
//! │  │ BoundedCache │  (hot tiles, LRU)     │
//! │  └──────────────┘                       │
//! └──────────┬─────────────────────┬────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │     TileStore      │ │     TileSource     │
//! │  (SQLite, disk)    │ │  (upstream HTTP)   │
//! └────────────────────┘ └────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoord`]: `zoom/x/y` address in the slippy-map scheme
//! - [`deg_to_tile`], [`tile_footprint_km`], [`expand_region`]: Web Mercator
//!   math used to turn a download region into tiles
//! - [`BoundedCache`]: fixed-capacity LRU cache
//! - [`TileService`]: cache → store → upstream lookup for single tiles

mod cache;
mod coord;
mod service;

pub use cache::{BoundedCache, DEFAULT_TILE_CACHE_CAPACITY};
pub use coord::{
    deg_to_tile, expand_region, region_tile_count, tile_footprint_km, TileCoord, EARTH_CIRCUMFERENCE_KM,
    MAX_LATITUDE, MAX_ZOOM,
};
pub use service::{TileOrigin, TileResponse, TileService};
