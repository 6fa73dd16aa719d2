//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("frame extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("video assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("audio mux failed: {0}")]
    MuxFailed(String),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),

    #[error("image operation failed: {0}")]
    Image(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a frame extraction error.
    pub fn extraction_failed(message: impl Into<String>) -> Self {
        Self::ExtractionFailed(message.into())
    }

    /// Create a video assembly error.
    pub fn assembly_failed(message: impl Into<String>) -> Self {
        Self::AssemblyFailed(message.into())
    }

    /// Create an audio mux error.
    pub fn mux_failed(message: impl Into<String>) -> Self {
        Self::MuxFailed(message.into())
    }

    /// Create an image operation error.
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image(message.into())
    }

    /// Whether the error should pass through stage wrapping untouched
    /// (cancellation, timeouts and missing-tool errors keep their identity).
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            MediaError::Cancelled
                | MediaError::Timeout(_)
                | MediaError::FfmpegNotFound
                | MediaError::FfprobeNotFound
                | MediaError::FileNotFound(_)
        )
    }
}
