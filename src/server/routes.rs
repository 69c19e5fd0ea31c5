//! Router configuration for the tile proxy.
//!
//! # Route Structure
//!
//! ```text
//! /health                          - Health check
//! /tiles/{zoom}/{x}/{y}            - Tile endpoint
//! /api/download                    - Queue a region download (POST)
//! /api/download/{job_id}/status    - Job progress
//! /api/download/{job_id}/cancel    - Cancel the running job (POST)
//! ```
//!
//! Every response, including 404s for unknown paths, carries
//! `Access-Control-Allow-Origin: *`. Any `OPTIONS` request is answered with
//! `204 No Content` and the allowed method and header lists.
//!
//! # Example
//!
//! ```ignore
//! use tile_proxy::server::{create_router, RouterConfig};
//!
//! let router = create_router(tile_service, queue, RouterConfig::default());
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:6565").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    cancel_handler, download_handler, health_handler, job_status_handler, not_found_handler,
    tile_handler, AppState,
};
use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::download::DownloadQueue;
use crate::source::TileSource;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Cache-Control max-age in seconds for tile responses
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    /// One-year tile max-age with tracing enabled.
    fn default() -> Self {
        Self {
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `tile_service` - Serves single tiles on demand
/// * `queue` - Handle to the bulk download queue
/// * `config` - Router configuration
pub fn create_router<S>(
    tile_service: TileService<S>,
    queue: DownloadQueue,
    config: RouterConfig,
) -> Router
where
    S: TileSource + 'static,
{
    let app_state = AppState::new(tile_service, queue, config.cache_max_age);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/tiles/{zoom}/{x}/{y}", get(tile_handler::<S>))
        .route("/api/download", post(download_handler::<S>))
        .route(
            "/api/download/{job_id}/status",
            get(job_status_handler::<S>),
        )
        .route("/api/download/{job_id}/cancel", post(cancel_handler::<S>))
        .fallback(not_found_handler)
        .with_state(app_state)
        .layer(build_cors_layer())
        .layer(middleware::from_fn(preflight_no_content));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the permissive CORS layer shared by every route.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400))
}

/// Answer preflight requests with `204 No Content`.
///
/// The CORS layer short-circuits every `OPTIONS` request with the allow
/// headers and an empty `200`; only the status is rewritten here.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;

    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

// =============================================================================
// Tests
// =============================================================================
