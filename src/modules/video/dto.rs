use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use crate::streaming::process::StreamInfo;

// --- INGESTION DTOs ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IngestRequest {
    #[validate(url(message = "source_url must be a valid URL"))]
    pub source_url: String,
    #[validate(length(min = 1, max = 128, message = "owner_id is required"))]
    pub owner_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub video_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListVideosQuery {
    pub owner_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PresignUploadRequest {
    #[validate(length(min = 1, max = 128, message = "owner_id is required"))]
    pub owner_id: String,
    #[validate(length(min = 1, max = 255, message = "file_name is required"))]
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresignedUrlResponse {
    pub key: String,
    pub url: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteVideoResponse {
    pub deleted: bool,
}

// --- STREAM DTOs ---

#[derive(Deserialize, Validate, ToSchema)]
pub struct StartStreamRequest {
    pub video_id: Uuid,
    #[validate(length(min = 1, max = 128, message = "stream_key is required"))]
    pub stream_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartStreamResponse {
    pub video_id: Uuid,
    pub position: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StopStreamRequest {
    pub video_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopStreamResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StreamsOverview {
    pub active: Vec<StreamInfo>,
    pub queued: usize,
    pub in_flight: Option<Uuid>,
}
