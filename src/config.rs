//! Configuration management for the tile proxy.
//!
//! Every option can be given as a command-line flag or an environment
//! variable; flags win over the environment.
//!
//! # Environment Variables
//!
//! - `ADDRESS` - Server bind address (default: 127.0.0.1)
//! - `PORT` - Server port (default: 6565)
//! - `DB_FILENAME` - SQLite tile database (default: tiles.db)
//! - `TILE_SOURCE_URL` - Upstream URL template with `{z}`, `{x}` and `{y}`
//! - `DOWNLOAD_DELAY_MS` - Pause between bulk-download fetches (default: 100)
//! - `CACHE_TILES` - Hot tiles kept in memory (default: 1024)
//! - `CACHE_MAX_AGE` - HTTP cache max-age seconds (default: one year)
//! - `RETENTION_DAYS` - Drop stored tiles older than this at startup
//! - `UPSTREAM_TIMEOUT_SECS` - Upstream request timeout (default: 30)

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::download::QueueConfig;
use crate::source::{build_tile_url, DEFAULT_TILE_SOURCE_URL};
use crate::tile::{TileCoord, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 6565;

/// Default tile database file.
pub const DEFAULT_DB_FILENAME: &str = "tiles.db";

/// Default pause between bulk-download fetches, in milliseconds.
pub const DEFAULT_DOWNLOAD_DELAY_MS: u64 = 100;

/// Default HTTP cache max-age in seconds (one year).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 31_536_000;

/// Default upstream request timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Proxy - a caching proxy for slippy-map imagery.
///
/// Serves map tiles from a local SQLite store, fetching and persisting them
/// from an upstream server on a miss, and pre-warms whole regions on request.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Address to bind the server to.
    #[arg(long, default_value = DEFAULT_ADDRESS, env = "ADDRESS")]
    pub address: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// SQLite database holding the tiles. Created if missing.
    #[arg(long, default_value = DEFAULT_DB_FILENAME, env = "DB_FILENAME")]
    pub db_filename: String,

    /// Delete stored tiles older than this many days at startup.
    #[arg(long, env = "RETENTION_DAYS")]
    pub retention_days: Option<u32>,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Upstream tile URL template.
    ///
    /// `{z}`, `{x}` and `{y}` are replaced by the tile coordinates.
    #[arg(long, default_value = DEFAULT_TILE_SOURCE_URL, env = "TILE_SOURCE_URL")]
    pub tile_source_url: String,

    /// Timeout for a single upstream request, in seconds.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: u64,

    /// Pause between consecutive tile fetches of a bulk download, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_DELAY_MS, env = "DOWNLOAD_DELAY_MS")]
    pub download_delay_ms: u64,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of tiles to keep in memory.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "CACHE_TILES")]
    pub cache_tiles: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.tile_source_url.contains(placeholder) {
                return Err(format!(
                    "tile_source_url must contain the {} placeholder. \
                     Set --tile-source-url or TILE_SOURCE_URL",
                    placeholder
                ));
            }
        }

        let sample = build_tile_url(&self.tile_source_url, TileCoord::new(0, 0, 0));
        Url::parse(&sample)
            .map_err(|e| format!("tile_source_url is not a valid URL: {}", e))?;

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.upstream_timeout_secs == 0 {
            return Err("upstream_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "address:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Download runner settings derived from the CLI.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::default().with_tile_delay(Duration::from_millis(self.download_delay_ms))
    }
}

// =============================================================================
// Tests
// =============================================================================
