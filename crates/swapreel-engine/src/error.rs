//! Engine error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use swapreel_media::MediaError;
use swapreel_models::GeometryError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("generation quota exceeded, resets at {reset_at}")]
    QuotaExceeded { reset_at: DateTime<Utc> },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("output not available for job {0}")]
    OutputNotAvailable(String),

    #[error("no face detected in {0}")]
    NoFaceDetected(String),

    #[error("pipeline failed: {0}")]
    Pipeline(String),

    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::TemplateNotFound(id.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Check if the error is a submission-time quota rejection.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, EngineError::QuotaExceeded { .. })
    }

    /// Check if the error was caused by cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Media(MediaError::Cancelled))
    }
}
