use async_trait::async_trait;
use aws_sdk_s3::{Client, config::Region, config::Credentials, config::BehaviorVersion};
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::config::settings::StorageConfig;

pub const DEFAULT_UPLOAD_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_DOWNLOAD_TTL: Duration = Duration::from_secs(60 * 60);

const MAX_NAME_LEN: usize = 80;

/// Durable blob storage reached through short-lived signed URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write-capable URL; the caller performs the PUT.
    async fn presign_upload(&self, key: &str, content_type: &str, ttl: Duration) -> AppResult<String>;

    async fn presign_download(&self, key: &str, ttl: Duration) -> AppResult<String>;

    /// Stream a local file into `key` through a presigned PUT.
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> AppResult<()>;

    /// Idempotent: deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Build a collision-free object key for an owner's upload:
/// `uploads/{owner_id}/{uuid}-{sanitized_name}`.
pub fn upload_key(owner_id: &str, file_name: &str) -> String {
    format!(
        "uploads/{}/{}-{}",
        sanitize_segment(owner_id),
        Uuid::new_v4(),
        sanitize_segment(file_name)
    )
}

fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        name.push_str("file");
    }
    name
}

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    http: reqwest::Client,
}

impl StorageService {
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(&config.access_key, &config.secret_key, None, None, "static");

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(s3_config);

        info!("✅ Connected to S3 bucket '{}'", config.bucket);

        Self {
            client,
            bucket: config.bucket.clone(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn presign_upload(&self, key: &str, content_type: &str, ttl: Duration) -> AppResult<String> {
        let presign = PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::Storage(format!("invalid upload ttl: {}", e)))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign)
            .await
            .map_err(|e| AppError::Storage(format!("failed to presign upload of {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }

    async fn presign_download(&self, key: &str, ttl: Duration) -> AppResult<String> {
        let presign = PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::Storage(format!("invalid download ttl: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| AppError::Storage(format!("failed to presign download of {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }

    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> AppResult<()> {
        let url = self.presign_upload(key, content_type, DEFAULT_UPLOAD_TTL).await?;

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AppError::Storage(format!("cannot open {}: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| AppError::Storage(format!("cannot stat {}: {}", path.display(), e)))?
            .len();

        debug!(key, size, "Uploading file through presigned PUT");

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        self.http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| AppError::Storage(format!("upload of {} failed: {}", key, e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        debug!(key, "Deleting object");

        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let status = e.raw_response().map(|resp| resp.status().as_u16());
                let code = e.as_service_error().and_then(|err| err.code());
                if is_missing_object(status, code) {
                    debug!(key, "Object already gone");
                    Ok(())
                } else {
                    Err(AppError::Storage(format!("failed to delete {}: {}", key, e)))
                }
            }
        }
    }
}

fn is_missing_object(status: Option<u16>, code: Option<&str>) -> bool {
    status == Some(404) || matches!(code, Some("NoSuchKey" | "NotFound"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_keys_are_namespaced_and_unique() {
        let a = upload_key("owner-1", "My Video.mp4");
        let b = upload_key("owner-1", "My Video.mp4");

        assert!(a.starts_with("uploads/owner-1/"));
        assert!(a.ends_with("-My-Video.mp4"));
        assert_ne!(a, b);
    }

    #[test]
    fn only_missing_objects_count_as_deleted() {
        assert!(is_missing_object(Some(404), None));
        assert!(is_missing_object(None, Some("NoSuchKey")));
        assert!(!is_missing_object(Some(403), Some("AccessDenied")));
        assert!(!is_missing_object(Some(500), None));
        assert!(!is_missing_object(None, None));
    }

    #[test]
    fn sanitizes_hostile_names() {
        assert_eq!(sanitize_segment("../../etc/passwd"), "etc-passwd");
        assert_eq!(sanitize_segment("  héllo wörld!! .mp4"), "h-llo-w-rld-.mp4");
        assert_eq!(sanitize_segment("???"), "file");
        assert_eq!(sanitize_segment(&"a".repeat(300)).len(), MAX_NAME_LEN);
    }
}
