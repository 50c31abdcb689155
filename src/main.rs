use std::sync::Arc;
use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod streaming;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::media::downloader::HttpDownloader;
use crate::infrastructure::media::ffmpeg::FfmpegLauncher;
use crate::infrastructure::media::ytdlp::YtDlp;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::video::repository::PgVideoRepository;
use crate::state::AppState;
use crate::streaming::registry::StreamRegistry;
use crate::workers::ingestion::IngestionPipeline;
use crate::workers::restream_queue::{JobQueue, QueueTiming};
use crate::workers::stream_monitor::spawn_exit_monitor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting restream worker...");

    let config = AppConfig::new().context("missing required environment variable")?;

    let pool = connect_to_db(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("✅ Database ready");

    for dir in [&config.ingest.work_dir, &config.streaming.work_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create work dir {}", dir.display()))?;
    }

    let videos = Arc::new(PgVideoRepository::new(pool));
    let storage = Arc::new(StorageService::new(&config.storage).await);
    let downloader = Arc::new(HttpDownloader::new(
        storage.clone(),
        YtDlp::new(config.ingest.ytdlp_path.clone()),
        config.storage.download_url_ttl,
    ));

    let (registry, exits) = StreamRegistry::new(config.streaming.cleanup_grace);
    let registry = Arc::new(registry);
    spawn_exit_monitor(registry.clone(), videos.clone(), exits);

    let queue = Arc::new(JobQueue::new(
        registry.clone(),
        downloader.clone(),
        Arc::new(FfmpegLauncher::new(&config.streaming)),
        videos.clone(),
        config.streaming.work_dir.clone(),
        QueueTiming {
            drain_delay: config.streaming.drain_delay,
            poll_interval: config.streaming.poll_interval,
        },
    ));
    let shutdown = CancellationToken::new();
    let queue_worker = queue.spawn(shutdown.clone());

    let ingestion = IngestionPipeline::new(
        Arc::new(YtDlp::new(config.ingest.ytdlp_path.clone())),
        videos.clone(),
        downloader,
        storage.clone(),
        config.ingest.work_dir.clone(),
    );

    let port = config.server_port;
    let state = AppState::new(config, videos, storage, registry.clone(), queue, ingestion);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🚀 Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, stopping restream queue");
    shutdown.cancel();
    let _ = queue_worker.await;

    let killed = registry.shutdown().await;
    info!(killed, "👋 All streams stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
