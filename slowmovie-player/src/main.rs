//! SlowMovie Player - Main entry point
//!
//! Wires together the storage layer, the frame renderer and the playback
//! scheduler, then runs the tick loop until a shutdown signal arrives.
//! Titles and settings are managed by the separate web management
//! surface; this service only plays whatever is marked active.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slowmovie_common::config::PlayerConfig;
use slowmovie_common::db::{init_database, CatalogStore, NowPlayingTracker};
use slowmovie_player::display::build_display_sink;
use slowmovie_player::render::FrameRenderer;
use slowmovie_player::scheduler::PlaybackScheduler;
use slowmovie_player::video::VideoSource;

/// Command-line arguments for the player
#[derive(Parser, Debug)]
#[command(name = "slowmovie-player")]
#[command(about = "Unattended slow-movie playback service")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "SLOWMOVIE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the video root path
    #[arg(long, env = "SLOWMOVIE_VIDEO_ROOT")]
    video_root: Option<PathBuf>,

    /// Override the database path
    #[arg(long, env = "SLOWMOVIE_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slowmovie_player=debug,slowmovie_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = args.video_root {
        config.video_root_path = Some(root.to_string_lossy().to_string());
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    config.validate().context("Invalid configuration")?;

    info!("Starting SlowMovie Player");
    info!("Database: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let catalog = CatalogStore::new(pool.clone());
    let now_playing = NowPlayingTracker::new(pool.clone());

    // Fatal precondition: without a settings row there is no root path
    // and no resolution to render onto
    let settings = catalog
        .reconcile_settings(&config)
        .await
        .context("Cannot start without a settings row")?;
    let (width, height) = settings.target_resolution();
    info!(
        "Video root: {}, target resolution {}x{}",
        settings.video_root_path, width, height
    );

    let titles = catalog.list_titles().await?;
    info!("Catalog holds {} title(s)", titles.len());

    let source = build_video_source().context("Failed to initialize video source")?;
    let display = build_display_sink(&config.display).context("Failed to build display sink")?;
    // Evaluated outside the macro: tracing's macros shadow locals named
    // `display` with `tracing::field::display`.
    let display_name = display.name();
    info!("Display sink: {}", display_name);

    let renderer = Arc::new(FrameRenderer::new(
        source,
        display,
        config.output_dir.clone(),
    ));
    let scheduler = PlaybackScheduler::new(
        catalog,
        now_playing,
        renderer,
        Duration::from_secs(config.idle_backoff_secs.max(1)),
    );

    tokio::select! {
        result = scheduler.run() => {
            result.context("Scheduler exited unexpectedly")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "ffmpeg")]
fn build_video_source() -> Result<Arc<dyn VideoSource>> {
    let source = slowmovie_player::video::FfmpegSource::new()?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "ffmpeg"))]
fn build_video_source() -> Result<Arc<dyn VideoSource>> {
    anyhow::bail!("built without the `ffmpeg` feature; no video source available")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
