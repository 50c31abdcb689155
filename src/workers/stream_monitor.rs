use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::common::error::AppError;
use crate::modules::video::model::VideoStatus;
use crate::modules::video::repository::VideoRepository;
use crate::streaming::process::StreamExit;
use crate::streaming::registry::StreamRegistry;

/// Reflect crashed restream processes into the registry and the video record.
pub fn spawn_exit_monitor(
    registry: Arc<StreamRegistry>,
    videos: Arc<dyn VideoRepository>,
    mut exits: mpsc::UnboundedReceiver<StreamExit>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🩺 Stream exit monitor running");
        while let Some(exit) = exits.recv().await {
            handle_exit(&registry, videos.as_ref(), exit).await;
        }
        debug!("Stream exit monitor stopped");
    })
}

async fn handle_exit(registry: &StreamRegistry, videos: &dyn VideoRepository, exit: StreamExit) {
    let video_id = exit.video_id;

    if !registry.remove_exited(video_id, exit.instance).await {
        debug!(%video_id, instance = %exit.instance, "Exited process was already replaced");
        return;
    }

    let crash = AppError::ProcessCrash {
        video_id,
        detail: exit.outcome.describe(),
    };
    error!(%video_id, "❌ {}", crash);

    if let Err(e) = videos.update_status(video_id, VideoStatus::Failed).await {
        error!(%video_id, "Failed to mark crashed stream as failed: {}", e);
    }
}
