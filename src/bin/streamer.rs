//! Camera Streamer Service
//!
//! Captures from the configured camera and broadcasts the encoded stream to
//! every connected viewer until interrupted.

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picam_streamer::config::AppConfig;
use picam_streamer::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camera streamer");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    tracing::info!(
        "{}x{} @ {} fps, http port {}, ws port {}",
        config.video.width,
        config.video.height,
        config.video.framerate,
        config.server.http_port,
        config.server.ws_port,
    );

    Supervisor::new(config).run().await?;
    Ok(())
}
