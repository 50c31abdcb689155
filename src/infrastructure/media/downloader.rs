use async_trait::async_trait;
use futures_util::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ytdlp::YtDlp;
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::storage::s3::ObjectStore;

/// Where a piece of media currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// An object already copied into our bucket.
    Stored(String),
    /// The source page or media URL submitted by the user.
    Source(String),
}

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Fetch `source` into a freshly named file under `dest_dir`.
    ///
    /// On error nothing is left behind at the returned location.
    async fn download(&self, source: &DownloadSource, dest_dir: &Path) -> AppResult<PathBuf>;
}

pub struct HttpDownloader {
    http: reqwest::Client,
    storage: Arc<dyn ObjectStore>,
    ytdlp: YtDlp,
    url_ttl: Duration,
}

impl HttpDownloader {
    pub fn new(storage: Arc<dyn ObjectStore>, ytdlp: YtDlp, url_ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            storage,
            ytdlp,
            url_ttl,
        }
    }

    async fn from_source(&self, source_url: &str, dest: &Path) -> AppResult<()> {
        prepare_destination(dest).await?;

        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let _part = PartialFile::new(Path::new(&part));
        let output = PartialFile::new(dest);

        self.ytdlp.download(source_url, dest).await?;
        if !fs::try_exists(dest).await.unwrap_or(false) {
            return Err(AppError::Download(format!(
                "downloader reported success but {} is missing",
                dest.display()
            )));
        }

        output.keep();
        Ok(())
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn download(&self, source: &DownloadSource, dest_dir: &Path) -> AppResult<PathBuf> {
        match source {
            DownloadSource::Stored(key) => {
                let dest = dest_dir.join(local_file_name(key));
                let url = self.storage.presign_download(key, self.url_ttl).await?;
                let bytes = stream_to_file(&self.http, &url, &dest).await?;
                info!(key = %key, bytes, path = %dest.display(), "⬇️ Downloaded object");
                Ok(dest)
            }
            DownloadSource::Source(source_url) => {
                let dest = dest_dir.join(local_file_name("source.mp4"));
                self.from_source(source_url, &dest).await?;
                info!(path = %dest.display(), "⬇️ Downloaded source video");
                Ok(dest)
            }
        }
    }
}

/// Random file name keeping the extension of `hint`, so concurrent jobs never share a path.
fn local_file_name(hint: &str) -> String {
    let ext = Path::new(hint)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("mp4");
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Make sure the parent directory exists and nothing stale sits at `dest`.
async fn prepare_destination(dest: &Path) -> AppResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Download(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    match fs::remove_file(dest).await {
        Ok(()) => {
            debug!(path = %dest.display(), "Removed stale file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Download(format!(
            "cannot replace stale {}: {}",
            dest.display(),
            e
        ))),
    }
}

/// Deletes a download target on drop unless [`keep`](Self::keep) was called.
///
/// Covers errors and callers dropping the download future midway alike.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial download"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove partial download: {}", e),
        }
    }
}

/// Stream the body of a GET on `url` into `dest`, chunk by chunk.
///
/// Returns the number of bytes written. Any failure, or dropping the returned
/// future, deletes whatever was written.
pub async fn stream_to_file(http: &reqwest::Client, url: &str, dest: &Path) -> AppResult<u64> {
    prepare_destination(dest).await?;

    let partial = PartialFile::new(dest);
    let written = write_body(http, url, dest).await?;
    partial.keep();
    Ok(written)
}

async fn write_body(http: &reqwest::Client, url: &str, dest: &Path) -> AppResult<u64> {
    // Presigned URLs carry credentials, keep them out of error messages.
    let resp = http
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| AppError::Download(format!("request failed: {}", e.without_url())))?;

    let mut file = fs::File::create(dest)
        .await
        .map_err(|e| AppError::Download(format!("cannot create {}: {}", dest.display(), e)))?;

    let mut body = resp.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::Download(format!(
                "stream interrupted after {} bytes: {}",
                written,
                e.without_url()
            ))
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Download(format!("write to {} failed: {}", dest.display(), e)))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| AppError::Download(format!("flush of {} failed: {}", dest.display(), e)))?;

    Ok(written)
}
