use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use super::model::{NewVideo, VideoAsset, VideoStatus};
use crate::common::error::AppResult;

/// Persistence seam for video assets.
///
/// The worker only ever touches `status`, `storage_key` and `live_started_at`
/// after creation; the rest of the row belongs to the dashboard layer.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, video: NewVideo) -> AppResult<VideoAsset>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VideoAsset>>;

    async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<VideoAsset>>;

    async fn update_status(&self, id: Uuid, status: VideoStatus) -> AppResult<()>;

    /// Record the storage key of a finished upload and mark the asset active.
    ///
    /// Returns false when the asset was deleted meanwhile.
    async fn complete_ingest(&self, id: Uuid, storage_key: &str) -> AppResult<bool>;

    /// Mark the asset as live, stamping when the feed went up.
    async fn mark_streaming(&self, id: Uuid) -> AppResult<()>;

    /// Returns false when no row matched.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn create(&self, video: NewVideo) -> AppResult<VideoAsset> {
        let asset = sqlx::query_as::<_, VideoAsset>(
            r#"
            INSERT INTO videos (id, owner_id, source_url, title, thumbnail_url, duration_seconds, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&video.owner_id)
        .bind(&video.source_url)
        .bind(&video.title)
        .bind(&video.thumbnail_url)
        .bind(video.duration_seconds)
        .bind(VideoStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(asset)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VideoAsset>> {
        let asset = sqlx::query_as::<_, VideoAsset>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }

    async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<VideoAsset>> {
        let assets = sqlx::query_as::<_, VideoAsset>(
            "SELECT * FROM videos WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    async fn update_status(&self, id: Uuid, status: VideoStatus) -> AppResult<()> {
        sqlx::query("UPDATE videos SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_ingest(&self, id: Uuid, storage_key: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE videos SET storage_key = $1, status = $2, updated_at = NOW() WHERE id = $3 AND status <> $4",
        )
        .bind(storage_key)
        .bind(VideoStatus::Active.as_str())
        .bind(id)
        .bind(VideoStatus::Deleted.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_streaming(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE videos SET status = $1, live_started_at = NOW(), updated_at = NOW() WHERE id = $2",
        )
        .bind(VideoStatus::Streaming.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
