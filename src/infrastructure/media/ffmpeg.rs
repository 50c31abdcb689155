use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;
use uuid::Uuid;

use crate::config::settings::{RestreamMode, StreamingConfig};

/// Everything needed to put one local file on air.
#[derive(Clone)]
pub struct RestreamRequest {
    pub video_id: Uuid,
    pub stream_key: String,
    pub local_path: PathBuf,
}

impl fmt::Debug for RestreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestreamRequest")
            .field("video_id", &self.video_id)
            .field("stream_key", &"<redacted>")
            .field("local_path", &self.local_path)
            .finish()
    }
}

/// Spawns the subprocess backing a stream.
///
/// Implementations must return a child with `stderr` piped and
/// `kill_on_drop` set, so a dropped handle never leaves a feed running.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, request: &RestreamRequest) -> std::io::Result<Child>;
}

#[derive(Clone, Debug)]
pub struct FfmpegLauncher {
    program: String,
    ingest_url: String,
    mode: RestreamMode,
}

impl FfmpegLauncher {
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            ingest_url: config.rtmp_ingest_url.clone(),
            mode: config.mode,
        }
    }
}

/// `{ingest_url}/{stream_key}` with exactly one separating slash.
pub fn destination_url(ingest_url: &str, stream_key: &str) -> String {
    format!(
        "{}/{}",
        ingest_url.trim_end_matches('/'),
        stream_key.trim_start_matches('/')
    )
}

/// Arguments for an endless loop of `request.local_path` pushed as FLV.
pub fn restream_args(request: &RestreamRequest, ingest_url: &str, mode: RestreamMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "warning", "-nostdin"]
        .into_iter()
        .map(OsString::from)
        .collect();

    args.extend(["-re", "-stream_loop", "-1", "-i"].map(OsString::from));
    args.push(request.local_path.clone().into_os_string());

    let codec_args: &[&str] = match mode {
        RestreamMode::Copy => &["-c:v", "copy", "-c:a", "copy"],
        RestreamMode::Reencode => &[
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-maxrate", "3000k",
            "-bufsize", "6000k",
            "-pix_fmt", "yuv420p",
            "-g", "50",
            "-c:a", "aac",
            "-b:a", "160k",
            "-ar", "44100",
        ],
    };
    args.extend(codec_args.iter().map(OsString::from));

    args.extend(["-f", "flv"].map(OsString::from));
    args.push(destination_url(ingest_url, &request.stream_key).into());
    args
}

impl ProcessLauncher for FfmpegLauncher {
    fn launch(&self, request: &RestreamRequest) -> std::io::Result<Child> {
        let args = restream_args(request, &self.ingest_url, self.mode);
        debug!(video_id = %request.video_id, mode = ?self.mode, "Spawning {}", self.program);

        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}
