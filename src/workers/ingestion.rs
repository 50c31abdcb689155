use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::infrastructure::media::downloader::{DownloadSource, MediaDownloader};
use crate::infrastructure::media::ytdlp::MetadataFetcher;
use crate::infrastructure::storage::s3::{upload_key, ObjectStore};
use crate::modules::video::model::{NewVideo, VideoAsset, VideoStatus};
use crate::modules::video::repository::VideoRepository;

const UPLOAD_CONTENT_TYPE: &str = "video/mp4";

/// An accepted ingestion: the new record plus the detached copy task.
pub struct Ingestion {
    pub video: VideoAsset,
    pub copy: JoinHandle<()>,
}

/// Copies source videos into object storage.
///
/// The request path only probes metadata and writes the record; the heavy
/// download/upload round trip runs in the background and always ends in
/// either `active` or `failed`.
#[derive(Clone)]
pub struct IngestionPipeline {
    fetcher: Arc<dyn MetadataFetcher>,
    videos: Arc<dyn VideoRepository>,
    downloader: Arc<dyn MediaDownloader>,
    storage: Arc<dyn ObjectStore>,
    work_dir: PathBuf,
}

impl IngestionPipeline {
    pub fn new(
        fetcher: Arc<dyn MetadataFetcher>,
        videos: Arc<dyn VideoRepository>,
        downloader: Arc<dyn MediaDownloader>,
        storage: Arc<dyn ObjectStore>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            videos,
            downloader,
            storage,
            work_dir,
        }
    }

    pub async fn ingest(&self, source_url: &str, owner_id: &str) -> AppResult<Ingestion> {
        let metadata = self.fetcher.fetch(source_url).await?;

        let video = self
            .videos
            .create(NewVideo {
                owner_id: owner_id.to_string(),
                source_url: source_url.trim().to_string(),
                title: metadata.title,
                thumbnail_url: metadata.thumbnail_url,
                duration_seconds: metadata.duration_seconds,
            })
            .await?;

        info!(video_id = %video.id, owner_id, "📼 Video registered, copying to storage");

        let pipeline = self.clone();
        let record = video.clone();
        let copy = tokio::spawn(async move { pipeline.copy_to_storage(record).await });

        Ok(Ingestion { video, copy })
    }

    async fn copy_to_storage(&self, video: VideoAsset) {
        let video_id = video.id;

        match self.try_copy(&video).await {
            Ok(key) => info!(%video_id, key = %key, "✅ Video stored"),
            Err(AppError::Cancelled(_)) => info!(%video_id, "Video deleted during ingestion, upload discarded"),
            Err(e) => {
                error!(%video_id, "❌ Ingestion failed: {}", e);
                if let Err(db_err) = self.videos.update_status(video_id, VideoStatus::Failed).await {
                    error!(%video_id, "Failed to update status to 'failed': {}", db_err);
                }
            }
        }
    }

    async fn try_copy(&self, video: &VideoAsset) -> AppResult<String> {
        self.videos.update_status(video.id, VideoStatus::Processing).await?;

        let local_path = self
            .downloader
            .download(&DownloadSource::Source(video.source_url.clone()), &self.work_dir)
            .await?;

        let key = upload_key(&video.owner_id, &format!("{}.mp4", video.title));
        let uploaded = self
            .storage
            .upload_file(&key, &local_path, UPLOAD_CONTENT_TYPE)
            .await;

        remove_local_copy(video.id, local_path).await;
        uploaded?;

        if !self.videos.complete_ingest(video.id, &key).await? {
            self.storage.delete(&key).await?;
            return Err(AppError::Cancelled(video.id));
        }
        Ok(key)
    }
}

async fn remove_local_copy(video_id: Uuid, path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(%video_id, path = %path.display(), "Failed to remove local copy: {}", e),
    }
}
