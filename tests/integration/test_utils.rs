//! Test utilities for integration tests.
//!
//! This module provides mock tile sources and helpers for building a router
//! backed by an in-memory tile store.

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use tile_proxy::download::{DownloadJob, DownloadQueue, QueueConfig};
use tile_proxy::error::FetchError;
use tile_proxy::source::TileSource;
use tile_proxy::store::TileStore;
use tile_proxy::tile::{TileCoord, TileService};
use tile_proxy::{create_router, RouterConfig};

/// A minimal PNG signature, enough for clients that sniff the format.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// =============================================================================
// Mock Tile Source
// =============================================================================

/// A mock tile source that records every requested coordinate.
///
/// Tiles not registered with [`with_tile`](Self::with_tile) are served as
/// [`PNG_BYTES`] unless the source was built failing.
pub struct MockTileSource {
    tiles: HashMap<TileCoord, Bytes>,
    failure: Option<FetchError>,
    delay: Duration,
    requests: Mutex<Vec<TileCoord>>,
    request_count: AtomicUsize,
}

impl MockTileSource {
    pub fn new() -> Self {
        Self {
            tiles: HashMap::new(),
            failure: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            request_count: AtomicUsize::new(0),
        }
    }

    /// A source whose upstream answers every request with `status`.
    pub fn failing(status: u16, reason: &str) -> Self {
        let mut source = Self::new();
        source.failure = Some(FetchError::Status {
            status,
            reason: reason.to_string(),
        });
        source
    }

    pub fn with_tile(mut self, coord: TileCoord, data: &'static [u8]) -> Self {
        self.tiles.insert(coord, Bytes::from_static(data));
        self
    }

    /// Wait this long before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<TileCoord> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockTileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileSource for MockTileSource {
    async fn fetch(&self, coord: TileCoord) -> Result<Bytes, FetchError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(coord);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(self
            .tiles
            .get(&coord)
            .cloned()
            .unwrap_or_else(|| Bytes::from_static(PNG_BYTES)))
    }
}

// =============================================================================
// Application Harness
// =============================================================================

/// Everything a test needs to drive the HTTP API.
pub struct TestApp {
    pub router: Router,
    pub store: TileStore,
    pub queue: DownloadQueue,
    pub source: Arc<MockTileSource>,
}

/// Create an in-memory tile store with the schema in place.
pub async fn test_store() -> TileStore {
    let store = TileStore::open_in_memory().await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

/// Build a router around `source` with a fast download runner.
pub async fn test_app(source: MockTileSource) -> TestApp {
    test_app_with_delay(source, Duration::from_millis(1)).await
}

/// Build a router around `source` pausing `tile_delay` between job fetches.
pub async fn test_app_with_delay(source: MockTileSource, tile_delay: Duration) -> TestApp {
    let store = test_store().await;
    let source = Arc::new(source);

    let queue = DownloadQueue::start(
        store.clone(),
        Arc::clone(&source),
        QueueConfig::default().with_tile_delay(tile_delay),
    );
    let tile_service = TileService::new(store.clone(), Arc::clone(&source));
    let router = create_router(
        tile_service,
        queue.clone(),
        RouterConfig::default().with_tracing(false),
    );

    TestApp {
        router,
        store,
        queue,
        source,
    }
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_job(queue: &DownloadQueue, id: uuid::Uuid) -> DownloadJob {
    for _ in 0..500 {
        if let Some(job) = queue.get_job_status(id).await {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal state", id);
}
