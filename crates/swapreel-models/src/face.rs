//! Face detection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A single face reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceDetection {
    /// Detection confidence (0.0 to 1.0)
    pub confidence: f64,
    /// Face bounding box
    pub bounding_box: BoundingBox,
    /// Anatomical landmark points (68-point layout when available)
    pub landmarks: Vec<Point>,
}

impl FaceDetection {
    /// Whether the detection carries a full landmark set usable for
    /// transform computation.
    pub fn has_landmarks(&self) -> bool {
        self.landmarks.len() > crate::geometry::RIGHT_EYE_OUTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_center() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 50.0);
        let c = b.center();
        assert!((c.x - 60.0).abs() < 1e-9);
        assert!((c.y - 45.0).abs() < 1e-9);
    }

    #[test]
    fn landmark_presence() {
        let detection = FaceDetection {
            confidence: 0.9,
            bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            landmarks: vec![Point::default(); 68],
        };
        assert!(detection.has_landmarks());

        let sparse = FaceDetection {
            landmarks: vec![Point::default(); 5],
            ..detection
        };
        assert!(!sparse.has_landmarks());
    }
}
