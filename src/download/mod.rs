//! Bulk region downloads.
//!
//! A download job pre-warms the tile store for a square region around a
//! point across a range of zoom levels. Jobs are queued in memory and run
//! strictly one after another by a single background runner, which fetches
//! tiles sequentially with a fixed pause to stay polite to the upstream.
//!
//! - [`DownloadRequest`]: region parameters and their validation
//! - [`DownloadJob`]: progress snapshot returned to clients
//! - [`DownloadQueue`]: enqueue, status, cancellation and shutdown

mod job;
mod queue;

pub use job::{DownloadJob, DownloadRequest, JobStatus, MAX_JOB_TILES};
pub use queue::{DownloadQueue, QueueConfig, DEFAULT_TILE_DELAY};
