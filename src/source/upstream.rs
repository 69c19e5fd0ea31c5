//! HTTP-backed tile source.
//!
//! Builds tile URLs from a template containing `{z}`, `{x}` and `{y}`
//! placeholders and fetches them with a shared `reqwest` client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::tile::TileCoord;

use super::TileSource;

/// Default upstream: Google satellite imagery.
pub const DEFAULT_TILE_SOURCE_URL: &str = "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}";

/// User-Agent sent upstream. Some imagery servers reject requests without one.
pub const USER_AGENT: &str = concat!("tile-proxy/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for upstream fetches.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Tile source that fetches from an HTTP(S) URL template.
///
/// # Example
///
/// ```no_run
/// use tile_proxy::source::{HttpTileSource, TileSource};
/// use tile_proxy::tile::TileCoord;
///
/// # async fn example() -> Result<(), tile_proxy::error::FetchError> {
/// let source = HttpTileSource::new("https://tile.example.com/{z}/{x}/{y}.png")?;
/// let bytes = source.fetch(TileCoord::new(3, 4, 2)).await?;
/// println!("fetched {} bytes", bytes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpTileSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpTileSource {
    /// Create a source with the default timeout.
    pub fn new(url_template: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(url_template, DEFAULT_UPSTREAM_TIMEOUT)
    }

    /// Create a source whose requests time out after `timeout`.
    pub fn with_timeout(
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    /// Substitute a coordinate into the URL template.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        build_tile_url(&self.url_template, coord)
    }
}

/// Replace the `{z}`, `{x}` and `{y}` placeholders of `template`.
pub fn build_tile_url(template: &str, coord: TileCoord) -> String {
    template
        .replace("{z}", &coord.zoom.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(&self, coord: TileCoord) -> Result<Bytes, FetchError> {
        let raw = self.tile_url(coord);
        let url = url::Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;

        trace!(%coord, %url, "Fetching tile from upstream");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%coord, status = status.as_u16(), "Upstream rejected tile request");
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}
