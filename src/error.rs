use thiserror::Error;

/// Errors raised by the persistent tile store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by SQLite or the connection pool
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors that can occur when fetching a tile from the upstream source.
///
/// The `Display` output is the human-readable reason reported to clients and
/// recorded on failed download jobs.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success HTTP status
    #[error("Upstream returned {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Connection, DNS, TLS or timeout failure
    #[error("Connection error: {0}")]
    Transport(String),

    /// The response body could not be read
    #[error("Failed to read upstream body: {0}")]
    Body(String),

    /// The tile URL could not be built from the configured template
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised when a download job is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    /// `min_zoom` is greater than `max_zoom`
    #[error("Invalid zoom range: min zoom {min_zoom} is greater than max zoom {max_zoom}")]
    InvalidZoomRange { min_zoom: u8, max_zoom: u8 },

    /// `max_zoom` exceeds the deepest supported level
    #[error("Zoom level {zoom} exceeds the maximum of {max}")]
    ZoomTooLarge { zoom: u8, max: u8 },

    /// Latitude or longitude is not finite or outside the projection bounds
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Radius is not a finite positive number
    #[error("Invalid radius: {0} km (must be a finite value greater than 0)")]
    InvalidRadius(f64),

    /// The region expands to more tiles than one job may fetch
    #[error("Region covers {tiles} tiles, more than the limit of {max} per job")]
    TooManyTiles { tiles: u64, max: u64 },

    /// The queue has been shut down and accepts no more jobs
    #[error("Download queue is shutting down")]
    ShuttingDown,
}
