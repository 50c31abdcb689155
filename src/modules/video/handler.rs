use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::video::dto::*;
use crate::modules::video::model::VideoAsset;
use crate::modules::video::service::VideoService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use uuid::Uuid;

// --- VIDEO HANDLERS ---

#[utoipa::path(
    post,
    path = "/api/v1/videos/ingest",
    request_body = IngestRequest,
    responses(
        (status = 201, description = "Video Registered", body = ApiResponse<IngestResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn ingest_video(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    info!(owner_id = %req.owner_id, "Ingest requested");
    match VideoService::ingest(state, req).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video registered, copy in progress"), StatusCode::CREATED).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "List Videos", body = ApiResponse<Vec<VideoAsset>>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<ListVideosQuery>,
) -> impl IntoResponse {
    match VideoService::list_videos(state, query.owner_id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Videos retrieved successfully"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Get Video", body = ApiResponse<VideoAsset>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::get_video(state, id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video retrieved successfully"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/download-url",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Presigned Download URL", body = ApiResponse<PresignedUrlResponse>),
        (status = 400, description = "Video Not Stored Yet"),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn get_download_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::download_url(state, id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Download URL generated"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video Deleted", body = ApiResponse<DeleteVideoResponse>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::delete_video(state, id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video deleted successfully"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/presign",
    request_body = PresignUploadRequest,
    responses(
        (status = 200, description = "Presigned Upload URL", body = ApiResponse<PresignedUrlResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn presign_upload(
    State(state): State<AppState>,
    Json(req): Json<PresignUploadRequest>,
) -> impl IntoResponse {
    match VideoService::presign_upload(state, req).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Upload URL generated"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

// --- STREAM HANDLERS ---

#[utoipa::path(
    post,
    path = "/api/v1/streams/start",
    request_body = StartStreamRequest,
    responses(
        (status = 202, description = "Stream Queued", body = ApiResponse<StartStreamResponse>),
        (status = 400, description = "Video Not Ready"),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streams"
)]
pub async fn start_stream(
    State(state): State<AppState>,
    Json(req): Json<StartStreamRequest>,
) -> impl IntoResponse {
    info!(video_id = %req.video_id, "Stream start requested");
    match VideoService::start_stream(state, req).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Stream queued"), StatusCode::ACCEPTED).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/streams/stop",
    request_body = StopStreamRequest,
    responses(
        (status = 200, description = "Stream Stopped", body = ApiResponse<StopStreamResponse>)
    ),
    tag = "Streams"
)]
pub async fn stop_stream(
    State(state): State<AppState>,
    Json(req): Json<StopStreamRequest>,
) -> impl IntoResponse {
    let res = VideoService::stop_stream(state, req.video_id).await;
    let message = if res.stopped { "Stream stopped" } else { "No active stream" };
    ApiSuccess(ApiResponse::success(res, message), StatusCode::OK).into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/streams",
    responses(
        (status = 200, description = "Active Streams", body = ApiResponse<StreamsOverview>)
    ),
    tag = "Streams"
)]
pub async fn list_streams(State(state): State<AppState>) -> impl IntoResponse {
    let res = VideoService::list_streams(state).await;
    ApiSuccess(ApiResponse::success(res, "Streams retrieved successfully"), StatusCode::OK).into_response()
}
