//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current output frame number
    pub frame: u64,
    /// Current processing FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Processing speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether processing is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of frames processed, given the expected total.
    ///
    /// Returns 0 while the total is unknown (zero); never exceeds 100.
    pub fn frame_percentage(&self, total_frames: u64) -> f64 {
        if total_frames == 0 {
            return 0.0;
        }
        ((self.frame as f64 / total_frames as f64) * 100.0).min(100.0)
    }
}
