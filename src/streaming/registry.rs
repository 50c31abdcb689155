use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::process::{StreamExit, StreamInfo, StreamProcess};
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::media::ffmpeg::{ProcessLauncher, RestreamRequest};

/// The set of streams currently on air, keyed by video id.
///
/// Every mutation happens under one lock, and replacing an entry kills the
/// previous process before the new one is spawned, so a video never has two
/// feeds at once.
pub struct StreamRegistry {
    streams: Mutex<HashMap<Uuid, StreamProcess>>,
    exits: mpsc::UnboundedSender<StreamExit>,
    cleanup_grace: Duration,
}

impl StreamRegistry {
    /// Returns the registry and the receiving end of its crash reports.
    pub fn new(cleanup_grace: Duration) -> (Self, mpsc::UnboundedReceiver<StreamExit>) {
        let (exits, exit_rx) = mpsc::unbounded_channel();
        let registry = Self {
            streams: Mutex::new(HashMap::new()),
            exits,
            cleanup_grace,
        };
        (registry, exit_rx)
    }

    /// Stop whatever runs for the video, then spawn and install a new process.
    ///
    /// `cancel` is checked under the lock so a stop issued before this call
    /// cannot be overtaken by the spawn.
    pub async fn launch(
        &self,
        request: RestreamRequest,
        launcher: &dyn ProcessLauncher,
        cancel: &CancellationToken,
    ) -> AppResult<StreamInfo> {
        let video_id = request.video_id;
        let mut streams = self.streams.lock().await;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(video_id));
        }

        if let Some(previous) = streams.remove(&video_id) {
            self.retire(previous, "replaced").await;
        }

        let process = StreamProcess::start(request, launcher, self.exits.clone())?;
        let info = process.info();
        streams.insert(video_id, process);
        Ok(info)
    }

    /// Install an already started process, stopping any previous one first.
    pub async fn register(&self, process: StreamProcess) -> StreamInfo {
        let mut streams = self.streams.lock().await;

        if let Some(previous) = streams.remove(&process.video_id()) {
            self.retire(previous, "replaced").await;
        }

        let info = process.info();
        streams.insert(process.video_id(), process);
        info
    }

    /// Kill the stream for `video_id`. Returns false when nothing was running.
    pub async fn stop(&self, video_id: Uuid) -> bool {
        let mut streams = self.streams.lock().await;
        match streams.remove(&video_id) {
            Some(process) => {
                self.retire(process, "stopped").await;
                true
            }
            None => {
                debug!(%video_id, "Stop requested for a video with no active stream");
                false
            }
        }
    }

    pub async fn lookup(&self, video_id: Uuid) -> Option<StreamInfo> {
        self.streams.lock().await.get(&video_id).map(StreamProcess::info)
    }

    /// True while `instance` is the process registered for `video_id`.
    pub async fn is_current(&self, video_id: Uuid, instance: Uuid) -> bool {
        self.streams
            .lock()
            .await
            .get(&video_id)
            .is_some_and(|process| process.instance() == instance)
    }

    pub async fn list(&self) -> Vec<StreamInfo> {
        let streams = self.streams.lock().await;
        let mut infos: Vec<StreamInfo> = streams.values().map(StreamProcess::info).collect();
        infos.sort_by_key(|info| info.started_at);
        infos
    }

    /// Drop the entry for a crashed process, unless it was already replaced.
    ///
    /// Returns true when the entry belonged to `instance` and was removed.
    pub async fn remove_exited(&self, video_id: Uuid, instance: Uuid) -> bool {
        let mut streams = self.streams.lock().await;
        let matches = streams
            .get(&video_id)
            .is_some_and(|process| process.instance() == instance);

        if !matches {
            return false;
        }

        if let Some(process) = streams.remove(&video_id) {
            schedule_cleanup(process.local_path().to_path_buf(), self.cleanup_grace);
        }
        true
    }

    /// Kill every stream. Used on shutdown, so files are removed right away.
    pub async fn shutdown(&self) -> usize {
        let mut streams = self.streams.lock().await;
        let count = streams.len();

        for (video_id, process) in streams.drain() {
            let outcome = process.stop().await;
            info!(%video_id, outcome = %outcome.describe(), "Stopped stream on shutdown");
            remove_local_file(process.local_path().to_path_buf()).await;
        }
        count
    }

    async fn retire(&self, process: StreamProcess, reason: &str) {
        let outcome = process.stop().await;
        info!(
            video_id = %process.video_id(),
            instance = %process.instance(),
            outcome = %outcome.describe(),
            "⏹️ Stream {}",
            reason
        );
        schedule_cleanup(process.local_path().to_path_buf(), self.cleanup_grace);
    }
}

/// Delete a stream's source file once the OS has had time to release it.
fn schedule_cleanup(path: PathBuf, grace: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        remove_local_file(path).await;
    });
}

async fn remove_local_file(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Removed stream source file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove stream source file: {}", e),
    }
}
