use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::infrastructure::media::downloader::{DownloadSource, MediaDownloader};
use crate::infrastructure::media::ffmpeg::{ProcessLauncher, RestreamRequest};
use crate::modules::video::events::StreamJob;
use crate::modules::video::model::VideoStatus;
use crate::modules::video::repository::VideoRepository;
use crate::streaming::process::StreamInfo;
use crate::streaming::registry::StreamRegistry;

#[derive(Default)]
struct Backlog {
    jobs: VecDeque<StreamJob>,
    /// The job currently being set up, if any. Doubles as the busy flag.
    in_flight: Option<(Uuid, CancellationToken)>,
}

pub struct QueueTiming {
    /// Pause after each job before looking at the backlog again.
    pub drain_delay: Duration,
    /// Fallback re-check while idle, in case a wake-up is missed.
    pub poll_interval: Duration,
}

/// In-memory FIFO of restream requests, drained by a single worker.
///
/// Only one job is set up at a time: each one downloads a full video and
/// spawns an ffmpeg process, and running them in parallel would starve the
/// host. Nothing here survives a restart.
pub struct JobQueue {
    backlog: Mutex<Backlog>,
    wake: Notify,
    registry: Arc<StreamRegistry>,
    downloader: Arc<dyn MediaDownloader>,
    launcher: Arc<dyn ProcessLauncher>,
    videos: Arc<dyn VideoRepository>,
    work_dir: PathBuf,
    timing: QueueTiming,
}

impl JobQueue {
    pub fn new(
        registry: Arc<StreamRegistry>,
        downloader: Arc<dyn MediaDownloader>,
        launcher: Arc<dyn ProcessLauncher>,
        videos: Arc<dyn VideoRepository>,
        work_dir: PathBuf,
        timing: QueueTiming,
    ) -> Self {
        Self {
            backlog: Mutex::new(Backlog::default()),
            wake: Notify::new(),
            registry,
            downloader,
            launcher,
            videos,
            work_dir,
            timing,
        }
    }

    /// Append a job and wake the worker. Returns the job's 1-based position.
    pub async fn enqueue(&self, job: StreamJob) -> usize {
        let position = {
            let mut backlog = self.backlog.lock().await;
            backlog.jobs.push_back(job);
            backlog.jobs.len()
        };
        info!(position, "📥 Restream job queued");
        self.wake.notify_one();
        position
    }

    /// Drop queued jobs for `video_id` and cancel it if it is being set up.
    ///
    /// Returns true when anything was cancelled.
    pub async fn cancel(&self, video_id: Uuid) -> bool {
        let mut backlog = self.backlog.lock().await;
        let before = backlog.jobs.len();
        backlog.jobs.retain(|job| job.video_id != video_id);
        let mut cancelled = backlog.jobs.len() != before;

        if let Some((current, token)) = &backlog.in_flight {
            if *current == video_id {
                token.cancel();
                cancelled = true;
            }
        }

        if cancelled {
            info!(%video_id, "🚫 Cancelled pending restream job");
        }
        cancelled
    }

    pub async fn pending(&self) -> usize {
        self.backlog.lock().await.jobs.len()
    }

    pub async fn in_flight(&self) -> Option<Uuid> {
        self.backlog.lock().await.in_flight.as_ref().map(|(id, _)| *id)
    }

    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run(shutdown).await })
    }

    /// Drain loop. Runs until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("🎬 Restream queue worker started");

        loop {
            let next = {
                let mut backlog = self.backlog.lock().await;
                let job = backlog.jobs.pop_front();
                if let Some(job) = &job {
                    backlog.in_flight = Some((job.video_id, CancellationToken::new()));
                }
                job.zip(backlog.in_flight.as_ref().map(|(_, token)| token.clone()))
            };

            let Some((job, cancel)) = next else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.wake.notified() => {}
                    _ = tokio::time::sleep(self.timing.poll_interval) => {}
                }
                continue;
            };

            self.process(job, &cancel).await;
            self.backlog.lock().await.in_flight = None;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.timing.drain_delay) => {}
            }
        }

        info!("Restream queue worker stopped");
    }

    async fn process(&self, job: StreamJob, cancel: &CancellationToken) {
        let video_id = job.video_id;
        info!(%video_id, "🛠️ Processing restream job");

        match self.start_stream(&job, cancel).await {
            Ok(stream) => info!(%video_id, pid = ?stream.pid, "✅ Stream is live"),
            Err(AppError::Cancelled(_)) => info!(%video_id, "Restream job cancelled before going live"),
            Err(e) => {
                error!(%video_id, "❌ Restream job failed: {}", e);
                if let Err(db_err) = self.videos.update_status(video_id, VideoStatus::Failed).await {
                    error!(%video_id, "Failed to update status to 'failed': {}", db_err);
                }
            }
        }
    }

    async fn start_stream(&self, job: &StreamJob, cancel: &CancellationToken) -> AppResult<StreamInfo> {
        let video_id = job.video_id;
        let source = DownloadSource::Stored(job.storage_key.clone());

        info!(%video_id, "⬇️ Downloading video for restream");
        let local_path = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled(video_id)),
            downloaded = self.downloader.download(&source, &self.work_dir) => downloaded?,
        };

        let request = RestreamRequest {
            video_id,
            stream_key: job.stream_key.clone(),
            local_path: local_path.clone(),
        };

        let stream = match self.registry.launch(request, self.launcher.as_ref(), cancel).await {
            Ok(stream) => stream,
            Err(e) => {
                if let Err(io_err) = tokio::fs::remove_file(&local_path).await {
                    warn!(%video_id, "Failed to remove unused download: {}", io_err);
                }
                return Err(e);
            }
        };

        if let Err(e) = self.videos.mark_streaming(video_id).await {
            // Never leave a feed running that the record does not know about.
            self.registry.stop(video_id).await;
            return Err(e);
        }

        // A stop that raced the status write must win.
        if cancel.is_cancelled() {
            self.videos.update_status(video_id, VideoStatus::Stopped).await?;
            return Ok(stream);
        }

        // The exit monitor may have recorded a crash before the write above landed.
        if !self.registry.is_current(video_id, stream.instance).await {
            return Err(AppError::ProcessCrash {
                video_id,
                detail: "exited before going live".to_string(),
            });
        }

        Ok(stream)
    }
}
