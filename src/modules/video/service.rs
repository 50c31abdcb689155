use super::dto::{
    DeleteVideoResponse, IngestRequest, IngestResponse, PresignUploadRequest, PresignedUrlResponse,
    StartStreamRequest, StartStreamResponse, StopStreamResponse, StreamsOverview,
};
use super::events::StreamJob;
use super::model::{VideoAsset, VideoStatus};
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::storage::s3::upload_key;
use crate::state::AppState;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

pub struct VideoService;

impl VideoService {
    async fn find(state: &AppState, id: Uuid) -> AppResult<VideoAsset> {
        state
            .videos
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
    }

    // --- VIDEOS ---

    pub async fn ingest(state: AppState, req: IngestRequest) -> AppResult<IngestResponse> {
        req.validate()?;
        let ingestion = state.ingestion.ingest(&req.source_url, &req.owner_id).await?;
        Ok(IngestResponse {
            video_id: ingestion.video.id,
        })
    }

    pub async fn list_videos(state: AppState, owner_id: String) -> AppResult<Vec<VideoAsset>> {
        if owner_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("owner_id is required".to_string()));
        }
        state.videos.list_by_owner(&owner_id).await
    }

    pub async fn get_video(state: AppState, id: Uuid) -> AppResult<VideoAsset> {
        Self::find(&state, id).await
    }

    pub async fn download_url(state: AppState, id: Uuid) -> AppResult<PresignedUrlResponse> {
        let video = Self::find(&state, id).await?;
        let key = video
            .storage_key
            .ok_or_else(|| AppError::InvalidRequest(format!("Video {} is not stored yet", id)))?;

        let ttl = state.config.storage.download_url_ttl;
        let url = state.storage.presign_download(&key, ttl).await?;
        Ok(PresignedUrlResponse {
            key,
            url,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    pub async fn presign_upload(state: AppState, req: PresignUploadRequest) -> AppResult<PresignedUrlResponse> {
        req.validate()?;
        let content_type = req
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| mime_guess::from_path(&req.file_name).first_or_octet_stream().to_string());

        let key = upload_key(&req.owner_id, &req.file_name);
        let ttl = state.config.storage.upload_url_ttl;
        let url = state.storage.presign_upload(&key, &content_type, ttl).await?;
        Ok(PresignedUrlResponse {
            key,
            url,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    /// Stop any stream, mark the record deleted, then remove the object and the row.
    pub async fn delete_video(state: AppState, id: Uuid) -> AppResult<DeleteVideoResponse> {
        let video = Self::find(&state, id).await?;

        state.queue.cancel(id).await;
        state.registry.stop(id).await;
        state.videos.update_status(id, VideoStatus::Deleted).await?;

        if let Some(key) = &video.storage_key {
            state.storage.delete(key).await?;
        }

        let deleted = state.videos.delete(id).await?;
        info!(video_id = %id, "🗑️ Video deleted");
        Ok(DeleteVideoResponse { deleted })
    }

    // --- STREAMS ---

    pub async fn start_stream(state: AppState, req: StartStreamRequest) -> AppResult<StartStreamResponse> {
        req.validate()?;
        let video = Self::find(&state, req.video_id).await?;
        if video.status == VideoStatus::Deleted {
            return Err(AppError::NotFound(format!("Video {} not found", video.id)));
        }
        let storage_key = video.storage_key.ok_or_else(|| {
            AppError::InvalidRequest(format!("Video {} has not finished ingesting", video.id))
        })?;

        let position = state
            .queue
            .enqueue(StreamJob {
                video_id: video.id,
                storage_key,
                stream_key: req.stream_key,
            })
            .await;

        Ok(StartStreamResponse {
            video_id: video.id,
            position,
        })
    }

    /// Cancel pending work and kill the live process. Unknown ids are a no-op.
    pub async fn stop_stream(state: AppState, video_id: Uuid) -> StopStreamResponse {
        let cancelled = state.queue.cancel(video_id).await;
        let killed = state.registry.stop(video_id).await;
        let stopped = cancelled || killed;

        if stopped {
            if let Err(e) = state.videos.update_status(video_id, VideoStatus::Stopped).await {
                error!(%video_id, "Failed to update status to 'stopped': {}", e);
            }
            info!(%video_id, "⏹️ Stream stopped");
        }

        StopStreamResponse { stopped }
    }

    pub async fn list_streams(state: AppState) -> StreamsOverview {
        StreamsOverview {
            active: state.registry.list().await,
            queued: state.queue.pending().await,
            in_flight: state.queue.in_flight().await,
        }
    }
}
