use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::config::env::{self, EnvKey};
use crate::infrastructure::storage::s3::{DEFAULT_DOWNLOAD_TTL, DEFAULT_UPLOAD_TTL};

pub const DEFAULT_RTMP_INGEST_URL: &str = "rtmp://a.rtmp.youtube.com/live2";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub streaming: StreamingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub upload_url_ttl: Duration,
    pub download_url_ttl: Duration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IngestConfig {
    pub ytdlp_path: String,
    pub work_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamingConfig {
    pub ffmpeg_path: String,
    pub rtmp_ingest_url: String,
    pub work_dir: PathBuf,
    pub mode: RestreamMode,
    pub cleanup_grace: Duration,
    pub drain_delay: Duration,
    pub poll_interval: Duration,
}

/// How ffmpeg treats the source codecs while pushing to the ingest endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestreamMode {
    /// Remux only, audio and video packets pass through untouched.
    #[default]
    Copy,
    /// Re-encode to H.264/AAC for sources YouTube rejects as-is.
    Reencode,
}

impl FromStr for RestreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(RestreamMode::Copy),
            "reencode" | "re-encode" | "transcode" => Ok(RestreamMode::Reencode),
            other => Err(format!("unknown restream mode '{}'", other)),
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let tmp = std::env::temp_dir();

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            storage: StorageConfig {
                endpoint: env::get(EnvKey::S3Endpoint)?,
                bucket: env::get(EnvKey::S3Bucket)?,
                region: env::get_or(EnvKey::S3Region, "us-east-1"),
                access_key: env::get(EnvKey::S3AccessKey)?,
                secret_key: env::get(EnvKey::S3SecretKey)?,
                upload_url_ttl: Duration::from_secs(env::get_parsed(EnvKey::UploadUrlTtl, DEFAULT_UPLOAD_TTL.as_secs())),
                download_url_ttl: Duration::from_secs(env::get_parsed(EnvKey::DownloadUrlTtl, DEFAULT_DOWNLOAD_TTL.as_secs())),
            },
            ingest: IngestConfig {
                ytdlp_path: env::get_or(EnvKey::YtDlpPath, "yt-dlp"),
                work_dir: env::get(EnvKey::IngestWorkDir)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| tmp.join("livecast").join("ingest")),
            },
            streaming: StreamingConfig {
                ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
                rtmp_ingest_url: env::get_or(EnvKey::RtmpIngestUrl, DEFAULT_RTMP_INGEST_URL),
                work_dir: env::get(EnvKey::StreamWorkDir)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| tmp.join("livecast").join("streams")),
                mode: env::get_parsed(EnvKey::RestreamMode, RestreamMode::Copy),
                cleanup_grace: Duration::from_secs(env::get_parsed(EnvKey::CleanupGrace, 5)),
                drain_delay: Duration::from_millis(env::get_parsed(EnvKey::QueueDrainDelay, 1000)),
                poll_interval: Duration::from_millis(env::get_parsed(EnvKey::QueuePollInterval, 5000)),
            },
        })
    }
}
