//! HTTP request handlers for the tile proxy API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{zoom}/{x}/{y}` - Serve a tile, fetching it upstream on a miss
//! - `POST /api/download` - Queue a region download
//! - `GET /api/download/{job_id}/status` - Job progress
//! - `POST /api/download/{job_id}/cancel` - Cancel the running job
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::download::{DownloadJob, DownloadQueue, DownloadRequest};
use crate::error::{FetchError, JobError};
use crate::source::TileSource;
use crate::tile::{TileCoord, TileService, MAX_ZOOM};

/// Header reporting which layer served a tile (`memory`, `store` or `miss`).
pub const TILE_CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-tile-cache-hit");

/// Content type of every served tile.
pub const TILE_CONTENT_TYPE: &str = "image/png";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState<S: TileSource> {
    /// The tile service for on-demand tile requests
    pub tile_service: Arc<TileService<S>>,

    /// Handle to the bulk download queue
    pub queue: DownloadQueue,

    /// Cache-Control max-age for tile responses, in seconds
    pub cache_max_age: u32,
}

impl<S: TileSource> AppState<S> {
    pub fn new(tile_service: TileService<S>, queue: DownloadQueue, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            queue,
            cache_max_age,
        }
    }
}

impl<S: TileSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            queue: self.queue.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned by the API endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Reply to a successful `POST /api/download`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQueuedResponse {
    pub success: bool,
    pub job_id: Uuid,
}

/// Reply to `POST /api/download/{job_id}/cancel`.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build a JSON error response, logging it by severity.
///
/// - 5xx at ERROR level
/// - 404 at DEBUG level (common and expected)
/// - other 4xx at WARN level
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

/// Rejected job requests map to 400; a queue that is shutting down to 503.
impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            JobError::InvalidZoomRange { .. } | JobError::ZoomTooLarge { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_zoom")
            }
            JobError::InvalidCoordinate(_) => (StatusCode::BAD_REQUEST, "invalid_coordinate"),
            JobError::InvalidRadius(_) => (StatusCode::BAD_REQUEST, "invalid_radius"),
            JobError::TooManyTiles { .. } => (StatusCode::BAD_REQUEST, "region_too_large"),
            JobError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
        };

        error_response(status, error_type, self.to_string())
    }
}

/// Upstream failures on the tile path are reported as plain text.
///
/// The body is the upstream reason so map clients can surface it.
fn upstream_failure(coord: TileCoord, err: &FetchError) -> Response {
    warn!(%coord, "Upstream fetch failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        err.to_string(),
    )
        .into_response()
}

fn job_not_found(job_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("Job not found: {}", job_id),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Parse and range-check `{zoom}/{x}/{y}` path segments.
///
/// Returns `None` for anything that is not a tile of the Web Mercator grid.
pub fn parse_tile_path(zoom: &str, x: &str, y: &str) -> Option<TileCoord> {
    let zoom: u8 = zoom.parse().ok()?;
    if zoom > MAX_ZOOM {
        return None;
    }
    let coord = TileCoord::new(zoom, x.parse().ok()?, y.parse().ok()?);
    coord.is_valid().then_some(coord)
}

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{zoom}/{x}/{y}`
///
/// # Response
///
/// - `200 OK`: tile image with `Content-Type: image/png`
/// - `404 Not Found`: segments are not integers or lie outside the grid
/// - `500 Internal Server Error`: upstream failure, body is the reason
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: memory|store|miss`
pub async fn tile_handler<S: TileSource>(
    State(state): State<AppState<S>>,
    Path((zoom, x, y)): Path<(String, String, String)>,
) -> Response {
    let Some(coord) = parse_tile_path(&zoom, &x, &y) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No such tile: {}/{}/{}", zoom, x, y),
        );
    };

    match state.tile_service.get_tile(coord).await {
        Ok(tile) => {
            debug!(%coord, origin = %tile.origin, bytes = tile.data.len(), "Serving tile");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, TILE_CONTENT_TYPE.to_string()),
                    (
                        header::CACHE_CONTROL,
                        format!("public, max-age={}", state.cache_max_age),
                    ),
                    (TILE_CACHE_HIT_HEADER, tile.origin.as_str().to_string()),
                ],
                tile.data,
            )
                .into_response()
        }
        Err(e) => upstream_failure(coord, &e),
    }
}

/// Queue a region download.
///
/// # Endpoint
///
/// `POST /api/download` with a JSON body:
///
/// ```json
/// { "lat": 47.99, "lon": -81.85, "minZoom": 1, "maxZoom": 14, "radiusKm": 10 }
/// ```
///
/// # Response
///
/// - `200 OK`: `{"success": true, "jobId": "..."}`
/// - `400 Bad Request`: malformed body or invalid parameters
/// - `503 Service Unavailable`: the server is shutting down
pub async fn download_handler<S: TileSource>(
    State(state): State<AppState<S>>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                rejection.body_text(),
            )
        }
    };

    match state.queue.queue_download(request).await {
        Ok(job_id) => Json(DownloadQueuedResponse {
            success: true,
            job_id,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Report a job's progress.
///
/// # Endpoint
///
/// `GET /api/download/{job_id}/status`
///
/// # Response
///
/// - `200 OK`: the job as camelCase JSON
/// - `404 Not Found`: unknown or malformed job id
pub async fn job_status_handler<S: TileSource>(
    State(state): State<AppState<S>>,
    Path(job_id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&job_id) else {
        return job_not_found(&job_id);
    };

    match state.queue.get_job_status(id).await {
        Some(job) => Json::<DownloadJob>(job).into_response(),
        None => job_not_found(&job_id),
    }
}

/// Cancel the running job.
///
/// # Endpoint
///
/// `POST /api/download/{job_id}/cancel`
///
/// # Response
///
/// - `200 OK`: `{"success": true}`
/// - `404 Not Found`: `{"success": false}` when the job is not the one
///   currently processing
pub async fn cancel_handler<S: TileSource>(
    State(state): State<AppState<S>>,
    Path(job_id): Path<String>,
) -> Response {
    let success = match Uuid::parse_str(&job_id) {
        Ok(id) => state.queue.cancel_download(id).await,
        Err(_) => false,
    };

    let status = if success {
        StatusCode::OK
    } else {
        debug!(job_id = %job_id, "Cancel request did not match the running job");
        StatusCode::NOT_FOUND
    };

    (status, Json(CancelResponse { success })).into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for paths that match no route.
pub async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "Not found".to_string())
}

// =============================================================================
// Tests
// =============================================================================
