use std::fmt;
use uuid::Uuid;

/// A request to put a stored video on air. Lives only in the restream queue.
#[derive(Clone)]
pub struct StreamJob {
    pub video_id: Uuid,
    pub storage_key: String,
    pub stream_key: String,
}

impl fmt::Debug for StreamJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamJob")
            .field("video_id", &self.video_id)
            .field("storage_key", &self.storage_key)
            .field("stream_key", &"<redacted>")
            .finish()
    }
}
