use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Active,
    Streaming,
    Stopped,
    Failed,
    Deleted,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Active => "active",
            VideoStatus::Streaming => "streaming",
            VideoStatus::Stopped => "stopped",
            VideoStatus::Failed => "failed",
            VideoStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "processing" => Ok(VideoStatus::Processing),
            // Rows written by the first worker generation used "done".
            "active" | "done" => Ok(VideoStatus::Active),
            "streaming" => Ok(VideoStatus::Streaming),
            "stopped" => Ok(VideoStatus::Stopped),
            "failed" => Ok(VideoStatus::Failed),
            "deleted" => Ok(VideoStatus::Deleted),
            other => Err(format!("unknown video status '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct VideoAsset {
    pub id: Uuid,
    pub owner_id: String,
    pub source_url: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
    pub storage_key: Option<String>,
    pub status: VideoStatus,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub live_started_at: Option<OffsetDateTime>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl<'r> FromRow<'r, PgRow> for VideoAsset {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            source_url: row.try_get("source_url")?,
            title: row.try_get("title")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            duration_seconds: row.try_get("duration_seconds")?,
            storage_key: row.try_get("storage_key")?,
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(|e: String| sqlx::Error::ColumnDecode {
                    index: "status".to_string(),
                    source: e.into(),
                })?,
            live_started_at: row.try_get("live_started_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fields captured when an ingestion request is accepted.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub owner_id: String,
    pub source_url: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
}
