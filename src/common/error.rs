use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Source URL rejected or the probing tool failed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Network or disk failure while pulling media to local storage.
    #[error("download error: {0}")]
    Download(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("failed to spawn restream process for video {video_id}: {source}")]
    ProcessSpawn {
        video_id: Uuid,
        #[source]
        source: std::io::Error,
    },

    #[error("restream process for video {video_id} exited unexpectedly ({detail})")]
    ProcessCrash { video_id: Uuid, detail: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("job for video {0} was cancelled")]
    Cancelled(Uuid),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest(errors.to_string())
    }
}
