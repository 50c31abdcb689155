use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    S3Endpoint,
    S3Bucket,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    UploadUrlTtl,
    DownloadUrlTtl,
    YtDlpPath,
    IngestWorkDir,
    FfmpegPath,
    RtmpIngestUrl,
    StreamWorkDir,
    RestreamMode,
    CleanupGrace,
    QueueDrainDelay,
    QueuePollInterval,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::UploadUrlTtl => "UPLOAD_URL_TTL_SECS",
            EnvKey::DownloadUrlTtl => "DOWNLOAD_URL_TTL_SECS",
            EnvKey::YtDlpPath => "YTDLP_PATH",
            EnvKey::IngestWorkDir => "INGEST_WORK_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::RtmpIngestUrl => "RTMP_INGEST_URL",
            EnvKey::StreamWorkDir => "STREAM_WORK_DIR",
            EnvKey::RestreamMode => "RESTREAM_MODE",
            EnvKey::CleanupGrace => "CLEANUP_GRACE_SECS",
            EnvKey::QueueDrainDelay => "QUEUE_DRAIN_DELAY_MS",
            EnvKey::QueuePollInterval => "QUEUE_POLL_INTERVAL_MS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => parse_or(key.as_str(), &val, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(name: &str, raw: &str, default: T) -> T {
    match raw.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(key = name, value = raw, "Ignoring malformed value, using default");
            default
        }
    }
}
