use utoipa::OpenApi;
use crate::modules::video::dto::*;
use crate::modules::video::model::{VideoAsset, VideoStatus};
use crate::streaming::process::StreamInfo;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::ingest_video,
        crate::modules::video::handler::list_videos,
        crate::modules::video::handler::get_video,
        crate::modules::video::handler::get_download_url,
        crate::modules::video::handler::delete_video,
        crate::modules::video::handler::presign_upload,
        crate::modules::video::handler::start_stream,
        crate::modules::video::handler::stop_stream,
        crate::modules::video::handler::list_streams,
    ),
    components(
        schemas(
            VideoAsset, VideoStatus, StreamInfo,
            IngestRequest, IngestResponse,
            PresignUploadRequest, PresignedUrlResponse, DeleteVideoResponse,
            StartStreamRequest, StartStreamResponse,
            StopStreamRequest, StopStreamResponse, StreamsOverview,
        )
    ),
    tags(
        (name = "Videos", description = "Video ingestion and storage"),
        (name = "Streams", description = "Live restream control")
    )
)]
pub struct ApiDoc;
