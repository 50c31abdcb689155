use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    let video_routes = Router::new()
        .route("/videos", get(handler::list_videos))
        .route("/videos/ingest", post(handler::ingest_video))
        .route("/videos/{id}", get(handler::get_video).delete(handler::delete_video))
        .route("/videos/{id}/download-url", get(handler::get_download_url))
        .route("/uploads/presign", post(handler::presign_upload));

    let stream_routes = Router::new()
        .route("/streams", get(handler::list_streams))
        .route("/streams/start", post(handler::start_stream))
        .route("/streams/stop", post(handler::stop_stream));

    video_routes.merge(stream_routes)
}
