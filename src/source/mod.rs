//! Upstream tile sources.
//!
//! A [`TileSource`] turns a tile coordinate into image bytes fetched from a
//! third-party imagery server. Sources perform exactly one attempt per call;
//! retry policy belongs to the caller.
//!
//! Dropping the future returned by [`TileSource::fetch`] aborts the request,
//! which is how the download queue cancels an in-flight fetch.

mod upstream;

pub use upstream::{
    build_tile_url, HttpTileSource, DEFAULT_TILE_SOURCE_URL, DEFAULT_UPSTREAM_TIMEOUT, USER_AGENT,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;
use crate::tile::TileCoord;

/// A stateless adapter to an upstream imagery server.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetch the encoded image for `coord`.
    ///
    /// Any non-success status or transport failure is returned as a
    /// [`FetchError`] carrying a human-readable reason.
    async fn fetch(&self, coord: TileCoord) -> Result<Bytes, FetchError>;
}
