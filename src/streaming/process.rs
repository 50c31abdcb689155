use serde::Serialize;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::common::error::{AppError, AppResult};
use crate::infrastructure::media::ffmpeg::{ProcessLauncher, RestreamRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Terminated by `stop`.
    Killed,
    /// The process ended on its own, with its exit code if it had one.
    Exited(Option<i32>),
    /// Waiting on the child failed; its fate is unknown.
    Lost(String),
}

impl ExitOutcome {
    pub fn describe(&self) -> String {
        match self {
            ExitOutcome::Killed => "killed".to_string(),
            ExitOutcome::Exited(Some(code)) => format!("exit code {}", code),
            ExitOutcome::Exited(None) => "terminated by signal".to_string(),
            ExitOutcome::Lost(e) => format!("wait failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Starting,
    Running,
    Stopping,
    Exited(ExitOutcome),
}

impl StreamState {
    pub fn is_exited(&self) -> bool {
        matches!(self, StreamState::Exited(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Starting => "starting",
            StreamState::Running => "running",
            StreamState::Stopping => "stopping",
            StreamState::Exited(_) => "exited",
        }
    }
}

/// Reported by a supervisor when its process ends without being asked to.
#[derive(Debug, Clone)]
pub struct StreamExit {
    pub video_id: Uuid,
    pub instance: Uuid,
    pub outcome: ExitOutcome,
}

/// Point-in-time view of a registered stream.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StreamInfo {
    pub video_id: Uuid,
    pub instance: Uuid,
    pub pid: Option<u32>,
    pub state: String,
    pub local_path: String,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: OffsetDateTime,
}

/// One restream subprocess bound to one video.
///
/// The child itself is owned by a supervisor task; this handle talks to it
/// through a cancellation token and observes it through a state channel.
#[derive(Debug)]
pub struct StreamProcess {
    video_id: Uuid,
    instance: Uuid,
    local_path: PathBuf,
    pid: Option<u32>,
    started_at: OffsetDateTime,
    cancel: CancellationToken,
    state: watch::Receiver<StreamState>,
}

impl StreamProcess {
    /// Spawn the subprocess and hand it to a supervisor task.
    ///
    /// Unexpected exits are sent on `exits`; exits caused by [`stop`](Self::stop) are not.
    pub fn start(
        request: RestreamRequest,
        launcher: &dyn ProcessLauncher,
        exits: mpsc::UnboundedSender<StreamExit>,
    ) -> AppResult<Self> {
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        state_tx.send_replace(StreamState::Starting);

        let mut child = launcher
            .launch(&request)
            .map_err(|source| AppError::ProcessSpawn {
                video_id: request.video_id,
                source,
            })?;

        let instance = Uuid::new_v4();
        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(request.video_id, stderr));
        }

        let cancel = CancellationToken::new();
        state_tx.send_replace(StreamState::Running);

        info!(video_id = %request.video_id, %instance, ?pid, "▶️ Restream process started");

        tokio::spawn(supervise(
            child,
            request.video_id,
            instance,
            cancel.clone(),
            state_tx,
            exits,
        ));

        Ok(Self {
            video_id: request.video_id,
            instance,
            local_path: request.local_path,
            pid,
            started_at: OffsetDateTime::now_utc(),
            cancel,
            state: state_rx,
        })
    }

    pub fn video_id(&self) -> Uuid {
        self.video_id
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            video_id: self.video_id,
            instance: self.instance,
            pid: self.pid,
            state: self.state.borrow().label().to_string(),
            local_path: self.local_path.display().to_string(),
            started_at: self.started_at,
        }
    }

    /// Kill the process and wait until its exit has been observed.
    ///
    /// Calling this on a process that already exited returns its outcome.
    pub async fn stop(&self) -> ExitOutcome {
        self.cancel.cancel();
        self.wait().await
    }

    pub async fn wait(&self) -> ExitOutcome {
        let mut state = self.state.clone();
        // The supervisor always publishes `Exited` before dropping its sender.
        let _ = state.wait_for(StreamState::is_exited).await;

        match &*state.borrow() {
            StreamState::Exited(outcome) => outcome.clone(),
            other => ExitOutcome::Lost(format!("supervisor gone while {}", other.label())),
        }
    }
}

async fn supervise(
    mut child: Child,
    video_id: Uuid,
    instance: Uuid,
    cancel: CancellationToken,
    state: watch::Sender<StreamState>,
    exits: mpsc::UnboundedSender<StreamExit>,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            state.send_replace(StreamState::Stopping);
            // The feed loops forever, a graceful quit would never converge.
            if let Err(e) = child.kill().await {
                warn!(%video_id, "Failed to kill restream process: {}", e);
            }
            ExitOutcome::Killed
        }
        status = child.wait() => {
            match status {
                Ok(exit_status) => ExitOutcome::Exited(exit_status.code()),
                Err(e) => ExitOutcome::Lost(e.to_string()),
            }
        }
    };

    debug!(%video_id, %instance, outcome = %outcome.describe(), "Restream process exited");
    state.send_replace(StreamState::Exited(outcome.clone()));

    if outcome != ExitOutcome::Killed {
        let _ = exits.send(StreamExit {
            video_id,
            instance,
            outcome,
        });
    }
}

async fn forward_stderr(video_id: Uuid, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(%video_id, "ffmpeg: {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::ShellLauncher;
    use std::time::Duration;

    fn request() -> RestreamRequest {
        RestreamRequest {
            video_id: Uuid::new_v4(),
            stream_key: "key123".to_string(),
            local_path: PathBuf::from("/tmp/does-not-matter.mp4"),
        }
    }

    #[tokio::test]
    async fn stop_kills_and_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let process = StreamProcess::start(request(), &ShellLauncher::long_running(), tx).unwrap();
        assert_eq!(process.state(), StreamState::Running);
        assert!(process.info().pid.is_some());

        assert_eq!(process.stop().await, ExitOutcome::Killed);
        assert_eq!(process.stop().await, ExitOutcome::Killed);
        assert_eq!(process.state(), StreamState::Exited(ExitOutcome::Killed));

        // A requested stop is not a crash.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unexpected_exit_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = request();
        let video_id = request.video_id;
        let process = StreamProcess::start(request, &ShellLauncher::exiting_with(3), tx).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(exit.video_id, video_id);
        assert_eq!(exit.instance, process.instance());
        assert_eq!(exit.outcome, ExitOutcome::Exited(Some(3)));
        assert_eq!(process.wait().await, ExitOutcome::Exited(Some(3)));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_as_spawn_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = StreamProcess::start(request(), &ShellLauncher::missing_binary(), tx).unwrap_err();
        assert!(matches!(err, AppError::ProcessSpawn { .. }));
    }
}
