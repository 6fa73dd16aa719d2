//! Placement geometry.
//!
//! Pure math over landmark point sets: centroids and the affine transform
//! that carries a detected source face onto a target face. No I/O; every
//! failure mode is an explicit [`GeometryError`] variant.
//!
//! # Landmark layout (68-point model)
//!
//! - 0-16: Jaw outline
//! - 17-26: Eyebrows
//! - 27-35: Nose
//! - 36-41: Right eye (subject's right, image left)
//! - 42-47: Left eye
//! - 48-67: Lips
//!
//! The outer-eye corners (indices 36 and 45) form the reference axis for
//! rotation and scale.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of the first outer-eye corner in the 68-point layout.
pub const LEFT_EYE_OUTER: usize = 36;
/// Index of the second outer-eye corner in the 68-point layout.
pub const RIGHT_EYE_OUTER: usize = 45;

/// Result type for geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors produced by geometry computations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("cannot compute centroid of an empty point set")]
    EmptyPointSet,

    #[error("landmark set has {got} points, need at least {need}")]
    IncompleteLandmarks { got: usize, need: usize },

    #[error("degenerate geometry: source eye distance is zero")]
    DegenerateGeometry,
}

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Affine placement transform carrying a source face onto a target face.
///
/// Rotation is in radians, scale is per axis (uniform for eye-axis derived
/// transforms), translation is in pixels. Consumed once by the compositor;
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransformMatrix {
    /// Rotation in radians (counter-clockwise in image coordinates)
    pub rotation: f64,
    /// Horizontal scale factor
    pub scale_x: f64,
    /// Vertical scale factor
    pub scale_y: f64,
    /// Horizontal translation in pixels
    pub translate_x: f64,
    /// Vertical translation in pixels
    pub translate_y: f64,
}

impl TransformMatrix {
    /// Rotation expressed in degrees.
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }

    /// Apply the transform to a source-space point.
    ///
    /// Scaling happens first, then rotation about the scaled source
    /// centroid, then translation. With a transform produced by
    /// [`compute_transform`] this maps the source centroid exactly onto the
    /// target centroid.
    pub fn apply(&self, point: Point, source_centroid: Point) -> Point {
        let (sin, cos) = self.rotation.sin_cos();
        let cx = source_centroid.x * self.scale_x;
        let cy = source_centroid.y * self.scale_y;
        let dx = point.x * self.scale_x - cx;
        let dy = point.y * self.scale_y - cy;
        Point::new(
            cx + self.translate_x + dx * cos - dy * sin,
            cy + self.translate_y + dx * sin + dy * cos,
        )
    }
}

/// Arithmetic mean of a point set.
pub fn centroid(points: &[Point]) -> GeometryResult<Point> {
    if points.is_empty() {
        return Err(GeometryError::EmptyPointSet);
    }

    let sum = points.iter().fold(Point::default(), |acc, p| {
        Point::new(acc.x + p.x, acc.y + p.y)
    });
    let n = points.len() as f64;
    Ok(Point::new(sum.x / n, sum.y / n))
}

/// Compute the transform mapping `source` landmarks onto `target` landmarks.
///
/// The outer-eye corners form the reference axis: rotation is the angle
/// difference between the two eye lines, scale is the ratio of eye
/// distances (applied uniformly), and translation carries the scaled source
/// centroid onto the target centroid.
pub fn compute_transform(source: &[Point], target: &[Point]) -> GeometryResult<TransformMatrix> {
    let (s_left, s_right) = eye_axis(source)?;
    let (t_left, t_right) = eye_axis(target)?;

    let source_angle = (s_right.y - s_left.y).atan2(s_right.x - s_left.x);
    let target_angle = (t_right.y - t_left.y).atan2(t_right.x - t_left.x);
    let rotation = target_angle - source_angle;

    let source_distance = s_left.distance(&s_right);
    if source_distance == 0.0 {
        return Err(GeometryError::DegenerateGeometry);
    }
    let scale = t_left.distance(&t_right) / source_distance;

    let source_center = centroid(source)?;
    let target_center = centroid(target)?;

    Ok(TransformMatrix {
        rotation,
        scale_x: scale,
        scale_y: scale,
        translate_x: target_center.x - source_center.x * scale,
        translate_y: target_center.y - source_center.y * scale,
    })
}

/// Fetch the outer-eye corner pair from a landmark set.
fn eye_axis(points: &[Point]) -> GeometryResult<(Point, Point)> {
    if points.is_empty() {
        return Err(GeometryError::EmptyPointSet);
    }
    if points.len() <= RIGHT_EYE_OUTER {
        return Err(GeometryError::IncompleteLandmarks {
            got: points.len(),
            need: RIGHT_EYE_OUTER + 1,
        });
    }
    Ok((points[LEFT_EYE_OUTER], points[RIGHT_EYE_OUTER]))
}
