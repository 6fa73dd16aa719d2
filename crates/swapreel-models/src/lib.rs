//! Shared data models for the Swapreel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job progress and status snapshots
//! - Templates and timed face placements
//! - Placement geometry (points, landmarks, transforms)
//! - Face detection results
//! - Encoding configuration

pub mod encoding;
pub mod face;
pub mod geometry;
pub mod job;
pub mod template;

// Re-export common types
pub use encoding::CodecOptions;
pub use face::{BoundingBox, FaceDetection};
pub use geometry::{
    centroid, compute_transform, GeometryError, GeometryResult, Point, TransformMatrix,
};
pub use job::{JobId, JobProgress, JobRecord, JobSnapshot, JobStage, JobState};
pub use template::{FacePlacement, Template};
