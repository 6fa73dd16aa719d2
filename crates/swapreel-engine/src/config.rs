//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use swapreel_media::CompositeOptions;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for finished output videos
    pub output_dir: PathBuf,
    /// Directory for per-job temporary working directories
    pub work_dir: PathBuf,
    /// Maximum frames composited concurrently within a single job
    pub frame_parallelism: usize,
    /// Quota window: one generation per caller per window
    pub quota_window: Duration,
    /// How often expired quota records are swept
    pub quota_sweep_interval: Duration,
    /// Wall-clock ceiling for a single FFmpeg invocation, if any
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Face blending tunables
    pub composite: CompositeOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            work_dir: PathBuf::from("/tmp/swapreel"),
            frame_parallelism: 4,
            quota_window: Duration::from_secs(24 * 60 * 60),
            quota_sweep_interval: Duration::from_secs(60 * 60),
            ffmpeg_timeout_secs: None,
            composite: CompositeOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            output_dir: std::env::var("SWAPREEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            work_dir: std::env::var("SWAPREEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            frame_parallelism: std::env::var("SWAPREEL_FRAME_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_parallelism),
            quota_window: Duration::from_secs(
                std::env::var("SWAPREEL_QUOTA_WINDOW_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|h| h * 60 * 60)
                    .unwrap_or(defaults.quota_window.as_secs()),
            ),
            quota_sweep_interval: Duration::from_secs(
                std::env::var("SWAPREEL_QUOTA_SWEEP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.quota_sweep_interval.as_secs()),
            ),
            ffmpeg_timeout_secs: std::env::var("SWAPREEL_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            composite: CompositeOptions::default(),
        }
    }
}
