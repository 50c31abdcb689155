pub mod downloader;
pub mod ffmpeg;
pub mod ytdlp;
