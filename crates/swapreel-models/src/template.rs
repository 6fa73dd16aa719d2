//! Template descriptors and timed face placements.
//!
//! Templates are owned by the catalog and immutable for the lifetime of a
//! job; the pipeline only borrows them.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A rectangular face-placement region valid for a range of frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FacePlacement {
    /// X coordinate of the top-left corner in pixels
    pub x: u32,
    /// Y coordinate of the top-left corner in pixels
    pub y: u32,
    /// Region width in pixels
    pub width: u32,
    /// Region height in pixels
    pub height: u32,
    /// Rotation in degrees (clockwise), applied to the placed face
    #[serde(default)]
    pub rotation: f64,
    /// First frame index the placement applies to
    #[serde(default)]
    pub frame_start: u64,
    /// Last frame index the placement applies to (inclusive); when absent
    /// the placement runs to the end of the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_end: Option<u64>,
}

impl FacePlacement {
    /// Create a placement covering every frame.
    pub fn full_range(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
            frame_start: 0,
            frame_end: None,
        }
    }

    /// Whether the placement applies to the given frame index.
    pub fn contains_frame(&self, frame: u64, total_frames: u64) -> bool {
        frame >= self.frame_start && frame <= self.frame_end.unwrap_or(total_frames)
    }

    /// Check the region has usable dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Immutable descriptor of a pre-recorded template video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    /// Template identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Path to the source video
    pub video_path: PathBuf,
    /// Optional separate audio track; the video itself is the audio source
    /// when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Frame rate in frames per second
    pub fps: f64,
    /// Total frame count (>= 1)
    pub total_frames: u64,
    /// Ordered face-placement regions; first match wins
    #[serde(default)]
    pub placements: Vec<FacePlacement>,
}

impl Template {
    /// Index of the placement active at `frame`.
    ///
    /// Ranges may overlap or leave gaps: the first placement whose range
    /// contains the frame wins, a frame matching no range falls back to the
    /// first placement, and a template with zero placements yields `None`
    /// (frames pass through unmodified).
    pub fn placement_index(&self, frame: u64) -> Option<usize> {
        self.placements
            .iter()
            .position(|p| p.contains_frame(frame, self.total_frames))
            .or(if self.placements.is_empty() {
                None
            } else {
                Some(0)
            })
    }

    /// The placement active at `frame`, if any.
    pub fn placement_for(&self, frame: u64) -> Option<&FacePlacement> {
        self.placement_index(frame).map(|i| &self.placements[i])
    }

    /// The audio source for the final mux: the dedicated audio track when
    /// present, otherwise the template video itself.
    pub fn audio_source(&self) -> &PathBuf {
        self.audio_path.as_ref().unwrap_or(&self.video_path)
    }
}
