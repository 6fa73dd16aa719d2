//! Engine environment selfcheck binary.
//!
//! Verifies the process can host the pipeline: working directories are
//! writable and the FFmpeg tools are on PATH.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swapreel_engine::EngineConfig;
use swapreel_media::{check_ffmpeg, check_ffprobe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("swapreel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    let config = EngineConfig::from_env();
    info!("Engine config: {:?}", config);

    tokio::fs::create_dir_all(&config.work_dir).await?;
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    info!(
        "Found ffmpeg at {}, ffprobe at {}",
        ffmpeg.display(),
        ffprobe.display()
    );

    println!("swapreel-selfcheck: ok");
    Ok(())
}
