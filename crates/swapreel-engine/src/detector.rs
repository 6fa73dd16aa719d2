//! Face detector interface.
//!
//! Detection is an opaque external capability. Availability is resolved at
//! process start and injected explicitly; the engine degrades to
//! rectangle-placement compositing when no detector is present.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use swapreel_models::FaceDetection;

use crate::error::EngineResult;

/// Detects a single face (with landmarks) in an image.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detect the most prominent face in the image at `image_path`.
    ///
    /// `Ok(None)` means the detector ran and found no face; errors mean
    /// the detector itself failed.
    async fn detect(&self, image_path: &Path) -> EngineResult<Option<FaceDetection>>;
}

/// A face detection capability that is either resolved at startup or
/// explicitly absent.
#[derive(Clone)]
pub enum DetectorCapability {
    /// Detector loaded and ready
    Available(Arc<dyn FaceDetector>),
    /// Detector could not be loaded; carries the reason for logs
    Unavailable(String),
}

impl DetectorCapability {
    /// Wrap a resolved detector.
    pub fn available(detector: Arc<dyn FaceDetector>) -> Self {
        Self::Available(detector)
    }

    /// Record an absent capability with the reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// The detector, when present.
    pub fn get(&self) -> Option<&Arc<dyn FaceDetector>> {
        match self {
            Self::Available(detector) => Some(detector),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl std::fmt::Debug for DetectorCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("DetectorCapability::Available"),
            Self::Unavailable(reason) => write!(f, "DetectorCapability::Unavailable({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_capability_yields_no_detector() {
        let capability = DetectorCapability::unavailable("models missing");
        assert!(!capability.is_available());
        assert!(capability.get().is_none());
    }
}
