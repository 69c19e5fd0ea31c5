//! HTTP server layer for the tile proxy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /tiles/{zoom}/{x}/{y}      POST /api/download ...       │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌───────────────────────────┐    │
//! │  │        handlers          │  │          routes           │    │
//! │  │ (tiles, jobs, health)    │  │ (router, CORS, tracing)   │    │
//! │  └──────────────────────────┘  └───────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    cancel_handler, download_handler, health_handler, job_status_handler, parse_tile_path,
    tile_handler, AppState, CancelResponse, DownloadQueuedResponse, ErrorResponse,
    HealthResponse, TILE_CACHE_HIT_HEADER, TILE_CONTENT_TYPE,
};
pub use routes::{create_router, RouterConfig};
