//! The download queue and its runner task.
//!
//! A single runner task owns all network work. It takes the oldest pending
//! job, expands its region, drops tiles already in the store and fetches the
//! rest one at a time with a pause between tiles. Only one job is ever
//! processing, and jobs start in the order they were queued.
//!
//! Each running job gets a [`CancellationToken`] derived from the queue's
//! shutdown token. Cancelling it stops the loop at the next tile boundary and
//! drops the in-flight fetch, which aborts the upstream request.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::source::TileSource;
use crate::store::TileStore;
use crate::tile::TileCoord;

use super::job::{DownloadJob, DownloadRequest, JobStatus};

/// Default pause between consecutive tile fetches of a job.
pub const DEFAULT_TILE_DELAY: Duration = Duration::from_millis(100);

/// Tuning for the download runner.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pause between consecutive tile fetches
    pub tile_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tile_delay: DEFAULT_TILE_DELAY,
        }
    }
}

impl QueueConfig {
    pub fn with_tile_delay(mut self, delay: Duration) -> Self {
        self.tile_delay = delay;
        self
    }
}

/// The job currently owned by the runner.
struct ActiveJob {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, DownloadJob>,
    pending: VecDeque<Uuid>,
    active: Option<ActiveJob>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    shutdown: CancellationToken,
}

/// Handle to the bulk download queue.
///
/// Cloning the handle is cheap; every clone talks to the same runner.
/// Terminal jobs stay queryable until the process exits.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tile_proxy::download::{DownloadQueue, DownloadRequest, QueueConfig};
/// use tile_proxy::source::HttpTileSource;
/// use tile_proxy::store::TileStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = TileStore::open("tiles.db").await?;
/// store.ensure_schema().await?;
/// let source = Arc::new(HttpTileSource::new("https://tile.example.com/{z}/{x}/{y}.png")?);
///
/// let queue = DownloadQueue::start(store, source, QueueConfig::default());
/// let id = queue
///     .queue_download(DownloadRequest::new(47.99, -81.85, 1, 12, 10.0))
///     .await?;
///
/// if let Some(job) = queue.get_job_status(id).await {
///     println!("{:?}: {}/{}", job.status, job.downloaded, job.total);
/// }
/// queue.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DownloadQueue {
    shared: Arc<Shared>,
    runner: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DownloadQueue {
    /// Create the queue and spawn its runner on the current Tokio runtime.
    pub fn start<S>(store: TileStore, source: Arc<S>, config: QueueConfig) -> Self
    where
        S: TileSource + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let runner = Runner {
            shared: Arc::clone(&shared),
            store,
            source,
            config,
        };
        let handle = tokio::spawn(runner.run());

        Self {
            shared,
            runner: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Queue a region download and return its job id.
    ///
    /// Returns immediately; the job runs once every earlier job has finished.
    pub async fn queue_download(&self, request: DownloadRequest) -> Result<Uuid, JobError> {
        request.validate()?;
        if self.shared.shutdown.is_cancelled() {
            return Err(JobError::ShuttingDown);
        }

        let id = Uuid::new_v4();
        {
            let mut state = self.shared.state.lock().await;
            state.jobs.insert(id, DownloadJob::new(id, &request));
            state.pending.push_back(id);
        }
        self.shared.wake.notify_one();

        info!(
            job_id = %id,
            lat = request.lat,
            lon = request.lon,
            min_zoom = request.min_zoom,
            max_zoom = request.max_zoom,
            radius_km = request.radius_km,
            "Queued download job"
        );
        Ok(id)
    }

    /// Snapshot of a job, or `None` if the id is unknown.
    pub async fn get_job_status(&self, id: Uuid) -> Option<DownloadJob> {
        self.shared.state.lock().await.jobs.get(&id).cloned()
    }

    /// Cancel the job that is currently processing.
    ///
    /// Returns `false` for unknown ids and for jobs that are pending or
    /// already finished.
    pub async fn cancel_download(&self, id: Uuid) -> bool {
        let mut state = self.shared.state.lock().await;

        let cancel = match &state.active {
            Some(active) if active.id == id => active.cancel.clone(),
            _ => return false,
        };

        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.status = JobStatus::Cancelled;
                cancel.cancel();
                info!(job_id = %id, downloaded = job.downloaded, total = job.total, "Cancelled download job");
                true
            }
            _ => false,
        }
    }

    /// Stop the runner.
    ///
    /// The in-flight fetch is aborted, the running job ends as cancelled and
    /// no pending job is started. Waits for the runner task to exit.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();

        let handle = self.runner.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Download runner panicked: {}", e);
            }
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}

struct Runner<S: TileSource> {
    shared: Arc<Shared>,
    store: TileStore,
    source: Arc<S>,
    config: QueueConfig,
}

/// Why a job's fetch loop stopped early.
enum Interrupt {
    Cancelled,
    Failed(String),
}

impl<S: TileSource> Runner<S> {
    async fn run(self) {
        debug!("Download runner started");

        loop {
            if self.shared.shutdown.is_cancelled() {
                break;
            }

            match self.next_job().await {
                Some((id, request, cancel)) => self.process(id, request, cancel).await,
                None => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = self.shared.shutdown.cancelled() => break,
                    }
                }
            }
        }

        debug!("Download runner stopped");
    }

    /// Move the oldest pending job to processing.
    async fn next_job(&self) -> Option<(Uuid, DownloadRequest, CancellationToken)> {
        let mut state = self.shared.state.lock().await;

        while let Some(id) = state.pending.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Pending {
                continue;
            }

            job.status = JobStatus::Processing;
            let request = job.request();
            let cancel = self.shared.shutdown.child_token();
            state.active = Some(ActiveJob {
                id,
                cancel: cancel.clone(),
            });
            return Some((id, request, cancel));
        }

        None
    }

    async fn process(&self, id: Uuid, request: DownloadRequest, cancel: CancellationToken) {
        let candidates = match tokio::task::spawn_blocking(move || request.tiles()).await {
            Ok(tiles) => tiles,
            Err(e) => {
                let reason = format!("Region expansion failed: {}", e);
                self.finish(id, Err(Interrupt::Failed(reason))).await;
                return;
            }
        };
        let existing = self.store.batch_check_tiles(&candidates).await;
        let remaining: Vec<TileCoord> = candidates
            .into_iter()
            .filter(|coord| !existing.contains(coord))
            .collect();

        self.update(id, |job| job.total = remaining.len() as u64).await;
        info!(
            job_id = %id,
            total = remaining.len(),
            already_cached = existing.len(),
            "Processing download job"
        );

        let outcome = self.fetch_all(id, &remaining, &cancel).await;
        self.finish(id, outcome).await;
    }

    async fn fetch_all(
        &self,
        id: Uuid,
        tiles: &[TileCoord],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        for (index, &coord) in tiles.iter().enumerate() {
            if cancel.is_cancelled() || !self.is_processing(id).await {
                return Err(Interrupt::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
                fetched = self.source.fetch(coord) => fetched,
            };

            match fetched {
                Ok(data) => {
                    if self.store.save_tile(coord.zoom, coord.x, coord.y, &data).await {
                        self.update(id, |job| job.downloaded += 1).await;
                    } else {
                        warn!(job_id = %id, %coord, "Fetched tile could not be stored");
                    }
                }
                Err(e) => {
                    warn!(job_id = %id, %coord, "Tile fetch failed: {}", e);
                    return Err(Interrupt::Failed(e.to_string()));
                }
            }

            if index + 1 < tiles.len() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
                    _ = tokio::time::sleep(self.config.tile_delay) => {}
                }
            }
        }

        Ok(())
    }

    /// Record the terminal state and release the active slot.
    async fn finish(&self, id: Uuid, outcome: Result<(), Interrupt>) {
        let mut state = self.shared.state.lock().await;
        state.active = None;

        let Some(job) = state.jobs.get_mut(&id) else {
            return;
        };

        // A cancel request may already have moved the job out of processing.
        if job.status == JobStatus::Processing {
            match outcome {
                Ok(()) => job.status = JobStatus::Completed,
                Err(Interrupt::Cancelled) => job.status = JobStatus::Cancelled,
                Err(Interrupt::Failed(reason)) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(reason);
                }
            }
        }

        match job.status {
            JobStatus::Failed => error!(
                job_id = %id,
                downloaded = job.downloaded,
                total = job.total,
                error = job.error.as_deref().unwrap_or_default(),
                "Download job failed"
            ),
            status => info!(
                job_id = %id,
                downloaded = job.downloaded,
                total = job.total,
                ?status,
                "Download job finished"
            ),
        }
    }

    async fn is_processing(&self, id: Uuid) -> bool {
        let state = self.shared.state.lock().await;
        state
            .jobs
            .get(&id)
            .is_some_and(|job| job.status == JobStatus::Processing)
    }

    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut DownloadJob)) {
        if let Some(job) = self.shared.state.lock().await.jobs.get_mut(&id) {
            apply(job);
        }
    }
}
