use std::sync::Arc;
use crate::config::settings::AppConfig;
use crate::infrastructure::storage::s3::ObjectStore;
use crate::modules::video::repository::VideoRepository;
use crate::streaming::registry::StreamRegistry;
use crate::workers::ingestion::IngestionPipeline;
use crate::workers::restream_queue::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub videos: Arc<dyn VideoRepository>,
    pub storage: Arc<dyn ObjectStore>,
    pub registry: Arc<StreamRegistry>,
    pub queue: Arc<JobQueue>,
    pub ingestion: IngestionPipeline,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn ObjectStore>,
        registry: Arc<StreamRegistry>,
        queue: Arc<JobQueue>,
        ingestion: IngestionPipeline,
    ) -> Self {
        Self {
            config,
            videos,
            storage,
            registry,
            queue,
            ingestion,
        }
    }
}
