use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::common::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
}

/// Resolve a source URL into display metadata without pulling any media.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str) -> AppResult<VideoMetadata>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Clone, Debug)]
pub struct YtDlp {
    program: String,
}

#[derive(Deserialize)]
struct RawMetadata {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
}

#[derive(Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

/// Only absolute http(s) URLs with a host are handed to yt-dlp.
pub fn validate_source_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Metadata(format!("invalid source url '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::Metadata(format!("unsupported source url '{}'", raw)));
    }

    Ok(url)
}

/// Parse the `--dump-single-json` document.
///
/// yt-dlp orders `thumbnails` from worst to best, so the last usable entry wins.
pub fn parse_metadata(stdout: &[u8]) -> AppResult<VideoMetadata> {
    let raw: RawMetadata = serde_json::from_slice(stdout)
        .map_err(|e| AppError::Metadata(format!("malformed yt-dlp output: {}", e)))?;

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Metadata("yt-dlp output has no title".to_string()))?;

    let thumbnail_url = raw
        .thumbnails
        .into_iter()
        .rev()
        .find_map(|t| t.url)
        .or(raw.thumbnail)
        .unwrap_or_default();

    let duration_seconds = raw
        .duration
        .map(|d| d.max(0.0).round() as i32)
        .unwrap_or(0);

    Ok(VideoMetadata {
        title,
        thumbnail_url,
        duration_seconds,
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output")
        .to_string()
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Download the best progressive mp4 rendition of `source_url` into `output`.
    pub async fn download(&self, source_url: &str, output: &Path) -> AppResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-q")
            .arg("--no-progress")
            .arg("--no-playlist")
            .arg("--no-continue") // Or else fails when file already exists, even an empty one
            .args(["-f", "best[ext=mp4]/best"])
            .arg("-o")
            .arg(output)
            .arg("--")
            .arg(source_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing command: {:?}", cmd);
        let res = cmd
            .output()
            .await
            .map_err(|e| AppError::Download(format!("failed to run {}: {}", self.program, e)))?;

        if res.status.success() {
            Ok(())
        } else {
            Err(AppError::Download(format!(
                "{} exited with {}: {}",
                self.program,
                res.status,
                stderr_tail(&res.stderr)
            )))
        }
    }
}

#[async_trait]
impl MetadataFetcher for YtDlp {
    async fn fetch(&self, source_url: &str) -> AppResult<VideoMetadata> {
        let url = validate_source_url(source_url)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-check-certificates")
            .arg("--")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Executing command: {:?}", cmd);
        let res = cmd
            .output()
            .await
            .map_err(|e| AppError::Metadata(format!("failed to run {}: {}", self.program, e)))?;

        if !res.status.success() {
            return Err(AppError::Metadata(format!(
                "{} exited with {}: {}",
                self.program,
                res.status,
                stderr_tail(&res.stderr)
            )));
        }

        parse_metadata(&res.stdout)
    }
}
