//! Download job types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;
use crate::tile::{expand_region, region_tile_count, TileCoord, MAX_LATITUDE, MAX_ZOOM};

/// Most candidate tiles a single job may cover, before deduplication.
pub const MAX_JOB_TILES: u64 = 1_000_000;

/// Lifecycle state of a download job.
///
/// ```text
/// pending ──► processing ──┬──► completed
///                          ├──► cancelled
///                          └──► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Whether the job has reached one of its final states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

/// Parameters of a region pre-warm request.
///
/// Deserialized from the JSON body of `POST /api/download`:
///
/// ```json
/// { "lat": 47.99, "lon": -81.85, "minZoom": 1, "maxZoom": 14, "radiusKm": 10 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Centre latitude in degrees
    pub lat: f64,

    /// Centre longitude in degrees
    pub lon: f64,

    /// First zoom level to fetch (inclusive)
    pub min_zoom: u8,

    /// Last zoom level to fetch (inclusive)
    pub max_zoom: u8,

    /// Approximate radius of the region in kilometres
    pub radius_km: f64,
}

impl DownloadRequest {
    pub fn new(lat: f64, lon: f64, min_zoom: u8, max_zoom: u8, radius_km: f64) -> Self {
        Self {
            lat,
            lon,
            min_zoom,
            max_zoom,
            radius_km,
        }
    }

    /// Reject parameters that cannot describe a region.
    pub fn validate(&self) -> Result<(), JobError> {
        if !self.lat.is_finite() || !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat) {
            return Err(JobError::InvalidCoordinate(format!(
                "latitude {} must be within ±{}",
                self.lat, MAX_LATITUDE
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(JobError::InvalidCoordinate(format!(
                "longitude {} must be within ±180",
                self.lon
            )));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(JobError::InvalidRadius(self.radius_km));
        }
        if self.min_zoom > self.max_zoom {
            return Err(JobError::InvalidZoomRange {
                min_zoom: self.min_zoom,
                max_zoom: self.max_zoom,
            });
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(JobError::ZoomTooLarge {
                zoom: self.max_zoom,
                max: MAX_ZOOM,
            });
        }

        let tiles = self.tile_count();
        if tiles > MAX_JOB_TILES {
            return Err(JobError::TooManyTiles {
                tiles,
                max: MAX_JOB_TILES,
            });
        }
        Ok(())
    }

    /// Number of candidate tiles, computed without expanding the region.
    pub fn tile_count(&self) -> u64 {
        region_tile_count(
            self.lat,
            self.lon,
            self.min_zoom,
            self.max_zoom,
            self.radius_km,
        )
    }

    /// Every candidate tile of the region, before deduplication.
    pub fn tiles(&self) -> Vec<TileCoord> {
        expand_region(
            self.lat,
            self.lon,
            self.min_zoom,
            self.max_zoom,
            self.radius_km,
        )
    }
}

/// A bulk download job as reported to clients.
///
/// Serialized with camelCase keys; `error` is present only for failed jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJob {
    pub id: Uuid,
    pub lat: f64,
    pub lon: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub radius_km: f64,
    pub status: JobStatus,

    /// Tiles fetched and persisted so far
    pub downloaded: u64,

    /// Tiles left to fetch after skipping those already stored
    pub total: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadJob {
    /// Create a pending job for `request`.
    pub fn new(id: Uuid, request: &DownloadRequest) -> Self {
        Self {
            id,
            lat: request.lat,
            lon: request.lon,
            min_zoom: request.min_zoom,
            max_zoom: request.max_zoom,
            radius_km: request.radius_km,
            status: JobStatus::Pending,
            downloaded: 0,
            total: 0,
            error: None,
        }
    }

    /// The region parameters this job was created from.
    pub fn request(&self) -> DownloadRequest {
        DownloadRequest::new(
            self.lat,
            self.lon,
            self.min_zoom,
            self.max_zoom,
            self.radius_km,
        )
    }
}
