//! Fakes and helpers shared by unit tests.

use async_trait::async_trait;
use axum::Router;
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::config::settings::{
    AppConfig, IngestConfig, RestreamMode, StorageConfig, StreamingConfig, DEFAULT_RTMP_INGEST_URL,
};
use crate::infrastructure::media::downloader::{DownloadSource, MediaDownloader};
use crate::infrastructure::media::ffmpeg::{ProcessLauncher, RestreamRequest};
use crate::infrastructure::media::ytdlp::{MetadataFetcher, VideoMetadata};
use crate::infrastructure::storage::s3::ObjectStore;
use crate::modules::video::model::{NewVideo, VideoAsset, VideoStatus};
use crate::modules::video::repository::VideoRepository;
use crate::state::AppState;
use crate::streaming::registry::StreamRegistry;
use crate::workers::ingestion::IngestionPipeline;
use crate::workers::restream_queue::{JobQueue, QueueTiming};

/// Ordered record of side effects across several fakes.
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(log: &Option<EventLog>, entry: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(entry);
    }
}

pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

// --- PROCESSES ---

/// Launches `sh` in place of ffmpeg.
pub struct ShellLauncher {
    program: String,
    args: Vec<String>,
    launches: Mutex<Vec<Uuid>>,
}

impl ShellLauncher {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn long_running() -> Self {
        Self::new("sh", &["-c", "exec sleep 30"])
    }

    pub fn exiting_with(code: i32) -> Self {
        let script = format!("exit {}", code);
        Self::new("sh", &["-c", &script])
    }

    pub fn missing_binary() -> Self {
        Self::new("/nonexistent/ffmpeg", &[])
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn launched_videos(&self) -> Vec<Uuid> {
        self.launches.lock().unwrap().clone()
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, request: &RestreamRequest) -> io::Result<Child> {
        self.launches.lock().unwrap().push(request.video_id);
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}

// --- VIDEO RECORDS ---

#[derive(Default)]
pub struct FakeVideoRepository {
    rows: Mutex<HashMap<Uuid, VideoAsset>>,
    history: Mutex<HashMap<Uuid, Vec<VideoStatus>>>,
    log: Option<EventLog>,
    streaming_delay: Duration,
}

impl FakeVideoRepository {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Every `mark_streaming` takes `delay` before it is applied, like a slow round trip.
    pub fn with_streaming_delay(delay: Duration) -> Self {
        Self {
            streaming_delay: delay,
            ..Self::default()
        }
    }

    pub fn insert(&self, storage_key: Option<&str>, status: VideoStatus) -> VideoAsset {
        let now = OffsetDateTime::now_utc();
        let video = VideoAsset {
            id: Uuid::new_v4(),
            owner_id: "owner".to_string(),
            source_url: "https://example.com/v/abc".to_string(),
            title: "clip".to_string(),
            thumbnail_url: String::new(),
            duration_seconds: 60,
            storage_key: storage_key.map(str::to_string),
            status,
            live_started_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(video.id, video.clone());
        self.history.lock().unwrap().insert(video.id, vec![status]);
        video
    }

    pub fn insert_active(&self, storage_key: &str) -> VideoAsset {
        self.insert(Some(storage_key), VideoStatus::Active)
    }

    pub fn get(&self, id: Uuid) -> Option<VideoAsset> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn status_of(&self, id: Uuid) -> Option<VideoStatus> {
        self.get(id).map(|v| v.status)
    }

    pub fn status_history(&self, id: Uuid) -> Vec<VideoStatus> {
        self.history.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Poll until `id` reaches `status` or `timeout` passes. Returns the last status seen.
    pub async fn wait_for_status(&self, id: Uuid, status: VideoStatus, timeout: Duration) -> Option<VideoStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.status_of(id);
            if current == Some(status) || tokio::time::Instant::now() >= deadline {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn set_status(&self, id: Uuid, status: VideoStatus, key: Option<&str>, live: bool) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&id) {
            row.status = status;
            if let Some(key) = key {
                row.storage_key = Some(key.to_string());
            }
            if live {
                row.live_started_at = Some(OffsetDateTime::now_utc());
            }
            row.updated_at = OffsetDateTime::now_utc();
            self.history.lock().unwrap().entry(id).or_default().push(status);
        }
    }
}

#[async_trait]
impl VideoRepository for FakeVideoRepository {
    async fn create(&self, video: NewVideo) -> AppResult<VideoAsset> {
        let now = OffsetDateTime::now_utc();
        let asset = VideoAsset {
            id: Uuid::new_v4(),
            owner_id: video.owner_id,
            source_url: video.source_url,
            title: video.title,
            thumbnail_url: video.thumbnail_url,
            duration_seconds: video.duration_seconds,
            storage_key: None,
            status: VideoStatus::Pending,
            live_started_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(asset.id, asset.clone());
        self.history.lock().unwrap().insert(asset.id, vec![VideoStatus::Pending]);
        Ok(asset)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VideoAsset>> {
        Ok(self.get(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<VideoAsset>> {
        let mut videos: Vec<VideoAsset> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn update_status(&self, id: Uuid, status: VideoStatus) -> AppResult<()> {
        record(&self.log, format!("db_status:{}", status));
        self.set_status(id, status, None, false);
        Ok(())
    }

    async fn complete_ingest(&self, id: Uuid, storage_key: &str) -> AppResult<bool> {
        let live = self
            .status_of(id)
            .is_some_and(|status| status != VideoStatus::Deleted);
        if live {
            self.set_status(id, VideoStatus::Active, Some(storage_key), false);
        }
        Ok(live)
    }

    async fn mark_streaming(&self, id: Uuid) -> AppResult<()> {
        if !self.streaming_delay.is_zero() {
            tokio::time::sleep(self.streaming_delay).await;
        }
        self.set_status(id, VideoStatus::Streaming, None, true);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        record(&self.log, format!("db_delete:{}", id));
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

// --- OBJECT STORAGE ---

pub struct FakeStore {
    download_base: String,
    fail_uploads: bool,
    calls: Mutex<Vec<String>>,
    log: Option<EventLog>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::serving_from("http://127.0.0.1:9".to_string())
    }
}

impl FakeStore {
    pub fn serving_from(download_base: String) -> Self {
        Self {
            download_base,
            fail_uploads: false,
            calls: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, entry: String) {
        record(&self.log, entry.clone());
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn presign_upload(&self, key: &str, _content_type: &str, ttl: Duration) -> AppResult<String> {
        self.call(format!("presign_upload:{}", key));
        Ok(format!("{}/{}?method=PUT&expires={}", self.download_base, key, ttl.as_secs()))
    }

    async fn presign_download(&self, key: &str, _ttl: Duration) -> AppResult<String> {
        self.call(format!("presign_download:{}", key));
        Ok(format!("{}/{}", self.download_base, key))
    }

    async fn upload_file(&self, key: &str, path: &Path, _content_type: &str) -> AppResult<()> {
        if self.fail_uploads {
            return Err(AppError::Storage(format!("upload of {} refused", path.display())));
        }
        self.call(format!("upload:{}", key));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.call(format!("delete:{}", key));
        Ok(())
    }
}

// --- MEDIA ---

pub struct FakeFetcher(Option<VideoMetadata>);

impl FakeFetcher {
    pub fn returning(title: &str, thumbnail_url: &str, duration_seconds: i32) -> Self {
        Self(Some(VideoMetadata {
            title: title.to_string(),
            thumbnail_url: thumbnail_url.to_string(),
            duration_seconds,
        }))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl MetadataFetcher for FakeFetcher {
    async fn fetch(&self, source_url: &str) -> AppResult<VideoMetadata> {
        self.0
            .clone()
            .ok_or_else(|| AppError::Metadata(format!("no metadata for {}", source_url)))
    }
}

#[derive(Default)]
struct DownloadStats {
    attempts: HashMap<String, usize>,
    events: Vec<(String, String)>,
    active: usize,
    max_active: usize,
    paths: Vec<PathBuf>,
}

/// Writes a small file per download, optionally after a delay.
pub struct FakeDownloader {
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    stats: Arc<Mutex<DownloadStats>>,
}

struct ActiveGuard(Arc<Mutex<DownloadStats>>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.lock().unwrap().active -= 1;
    }
}

impl FakeDownloader {
    pub fn instant() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            failing: Mutex::new(HashSet::new()),
            stats: Arc::new(Mutex::new(DownloadStats::default())),
        }
    }

    /// Fail every download of `key` (storage key or source URL).
    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn attempts(&self, key: &str) -> usize {
        self.stats.lock().unwrap().attempts.get(key).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.stats.lock().unwrap().events.clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.stats.lock().unwrap().max_active
    }

    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.stats.lock().unwrap().paths.clone()
    }

    fn begin(&self, key: &str) -> ActiveGuard {
        let mut stats = self.stats.lock().unwrap();
        *stats.attempts.entry(key.to_string()).or_default() += 1;
        stats.events.push(("start".to_string(), key.to_string()));
        stats.active += 1;
        stats.max_active = stats.max_active.max(stats.active);
        ActiveGuard(self.stats.clone())
    }

    fn end(&self, key: &str) {
        self.stats.lock().unwrap().events.push(("end".to_string(), key.to_string()));
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, source: &DownloadSource, dest_dir: &Path) -> AppResult<PathBuf> {
        let key = match source {
            DownloadSource::Stored(key) => key.as_str(),
            DownloadSource::Source(url) => url.as_str(),
        };

        let _active = self.begin(key);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.lock().unwrap().contains(key) {
            self.end(key);
            return Err(AppError::Download(format!("{} is unreachable", key)));
        }

        let path = dest_dir.join(format!("{}.mp4", Uuid::new_v4()));
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| AppError::Download(e.to_string()))?;
        tokio::fs::write(&path, b"media")
            .await
            .map_err(|e| AppError::Download(e.to_string()))?;

        self.stats.lock().unwrap().paths.push(path.clone());
        self.end(key);
        Ok(path)
    }
}

// --- APPLICATION ---

pub fn test_config(work_dir: &Path) -> AppConfig {
    AppConfig {
        server_port: 0,
        database_url: "postgres://localhost/unused".to_string(),
        storage: StorageConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            bucket: "videos".to_string(),
            region: "us-east-1".to_string(),
            access_key: "test".to_string(),
            secret_key: "test".to_string(),
            upload_url_ttl: Duration::from_secs(900),
            download_url_ttl: Duration::from_secs(3600),
        },
        ingest: IngestConfig {
            ytdlp_path: "yt-dlp".to_string(),
            work_dir: work_dir.join("ingest"),
        },
        streaming: StreamingConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            rtmp_ingest_url: DEFAULT_RTMP_INGEST_URL.to_string(),
            work_dir: work_dir.join("streams"),
            mode: RestreamMode::Copy,
            cleanup_grace: Duration::ZERO,
            drain_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(50),
        },
    }
}

/// A fully wired `AppState` over fakes, with the queue worker running.
pub struct TestApp {
    pub state: AppState,
    pub videos: Arc<FakeVideoRepository>,
    pub store: Arc<FakeStore>,
    pub downloader: Arc<FakeDownloader>,
    pub launcher: Arc<ShellLauncher>,
    pub log: EventLog,
    pub shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_downloader(FakeDownloader::instant())
    }

    pub fn with_downloader(downloader: FakeDownloader) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let log: EventLog = Arc::default();

        let videos = Arc::new(FakeVideoRepository::with_log(log.clone()));
        let store = Arc::new(FakeStore::with_log(log.clone()));
        let downloader = Arc::new(downloader);
        let launcher = Arc::new(ShellLauncher::long_running());

        let (registry, _exits) = StreamRegistry::new(config.streaming.cleanup_grace);
        let registry = Arc::new(registry);

        let queue = Arc::new(JobQueue::new(
            registry.clone(),
            downloader.clone(),
            launcher.clone(),
            videos.clone(),
            config.streaming.work_dir.clone(),
            QueueTiming {
                drain_delay: config.streaming.drain_delay,
                poll_interval: config.streaming.poll_interval,
            },
        ));
        let shutdown = CancellationToken::new();
        queue.spawn(shutdown.clone());

        let ingestion = IngestionPipeline::new(
            Arc::new(FakeFetcher::returning("T", "th.jpg", 42)),
            videos.clone(),
            downloader.clone(),
            store.clone(),
            config.ingest.work_dir.clone(),
        );

        let state = AppState::new(config, videos.clone(), store.clone(), registry, queue, ingestion);

        Self {
            state,
            videos,
            store,
            downloader,
            launcher,
            log,
            shutdown,
            _dir: dir,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub async fn teardown(self) {
        self.shutdown.cancel();
        self.state.registry.shutdown().await;
    }
}
