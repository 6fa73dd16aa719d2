//! Per-frame face compositing.
//!
//! Places a prepared user face onto a template frame: cover-fit resize to
//! the placement rectangle, rotation about the face center, first-moment
//! color matching against the destination frame, radial alpha feathering,
//! and "over" blending. Output stays lossless (PNG); lossy encoding happens
//! at assembly.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use swapreel_models::FacePlacement;

use crate::error::{MediaError, MediaResult};

/// Tunables for face blending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeOptions {
    /// Feathering toggle/extent in pixels; 0 disables the radial mask
    pub feather_radius: u32,
    /// Overall face opacity during the "over" blend
    pub blend_alpha: f64,
    /// Shift face channels toward the destination frame's mean tone
    pub color_match: bool,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            feather_radius: 15,
            blend_alpha: 0.95,
            color_match: true,
        }
    }
}

/// Outcome of a single frame composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOutcome {
    /// The face was blended into the frame
    Composited,
    /// The original frame was copied through unchanged
    PassedThrough,
}

/// A user face prepared for one placement rectangle, reusable across all
/// frames that placement covers.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    /// Cover-fit resized face, pre-rotation
    face: RgbaImage,
    placement: FacePlacement,
    options: CompositeOptions,
}

impl FrameCompositor {
    /// Load and size the user face for a placement rectangle.
    ///
    /// The face is resized preserving aspect ratio to fully cover the
    /// rectangle, overflow cropped centered. Fails on unreadable images and
    /// zero-size regions; callers treat that as a soft failure and pass
    /// frames through.
    pub fn new(
        face_path: impl AsRef<Path>,
        placement: &FacePlacement,
        options: CompositeOptions,
    ) -> MediaResult<Self> {
        if !placement.is_valid() {
            return Err(MediaError::image("zero-size placement region"));
        }

        let face = image::open(face_path.as_ref())
            .map_err(|e| MediaError::image(format!("failed to read face image: {}", e)))?
            .resize_to_fill(placement.width, placement.height, FilterType::Lanczos3)
            .to_rgba8();

        Ok(Self {
            face,
            placement: placement.clone(),
            options,
        })
    }

    /// The placement this compositor was prepared for.
    pub fn placement(&self) -> &FacePlacement {
        &self.placement
    }

    /// Composite the prepared face onto the frame at `frame_path`, writing
    /// the result to `output_path` as PNG.
    ///
    /// `rotation_override` replaces the placement's static rotation when a
    /// per-frame detection produced a refined angle.
    pub fn composite(
        &self,
        frame_path: &Path,
        output_path: &Path,
        rotation_override: Option<f64>,
    ) -> MediaResult<()> {
        let mut frame = image::open(frame_path)
            .map_err(|e| MediaError::image(format!("failed to read frame: {}", e)))?
            .to_rgba8();

        let rotation = rotation_override.unwrap_or(self.placement.rotation);
        let mut face = if rotation != 0.0 {
            rotate_about_center(&self.face, rotation)
        } else {
            self.face.clone()
        };

        if self.options.color_match {
            let frame_mean = channel_means(&frame, false);
            let face_mean = channel_means(&face, true);
            shift_channels(&mut face, frame_mean, face_mean);
        }

        apply_alpha_mask(
            &mut face,
            self.options.feather_radius,
            self.options.blend_alpha,
        );

        imageops::overlay(
            &mut frame,
            &face,
            self.placement.x as i64,
            self.placement.y as i64,
        );

        frame
            .save(output_path)
            .map_err(|e| MediaError::image(format!("failed to write frame: {}", e)))
    }
}

/// Composite with pass-through fallback.
///
/// Any composite failure (or an absent compositor) copies the source frame
/// bytes to the output unchanged; only the copy itself can fail the call.
pub fn composite_or_copy(
    compositor: Option<&FrameCompositor>,
    frame_path: &Path,
    output_path: &Path,
    rotation_override: Option<f64>,
) -> MediaResult<CompositeOutcome> {
    if let Some(compositor) = compositor {
        match compositor.composite(frame_path, output_path, rotation_override) {
            Ok(()) => return Ok(CompositeOutcome::Composited),
            Err(e) => {
                warn!(
                    "Compositing failed for {}, passing frame through: {}",
                    frame_path.display(),
                    e
                );
            }
        }
    }

    std::fs::copy(frame_path, output_path)?;
    Ok(CompositeOutcome::PassedThrough)
}

/// Rotate clockwise about the image center, keeping dimensions and padding
/// uncovered pixels with full transparency.
fn rotate_about_center(src: &RgbaImage, degrees: f64) -> RgbaImage {
    let (width, height) = src.dimensions();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let (sin, cos) = degrees.to_radians().sin_cos();

    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            // Inverse-map the output pixel into source space.
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let sx = cx + dx * cos + dy * sin - 0.5;
            let sy = cy - dx * sin + dy * cos - 0.5;
            out.put_pixel(x, y, sample_bilinear(src, sx, sy));
        }
    }
    out
}

/// Alpha-weighted bilinear sample; coordinates outside the image read as
/// fully transparent.
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut color = [0.0f64; 3];
    let mut alpha = 0.0f64;
    let mut weight_sum = 0.0f64;

    for (ix, iy, w) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ] {
        if ix < 0.0 || iy < 0.0 || ix >= src.width() as f64 || iy >= src.height() as f64 {
            continue;
        }
        let p = src.get_pixel(ix as u32, iy as u32);
        let a = p[3] as f64 / 255.0;
        for c in 0..3 {
            color[c] += p[c] as f64 * a * w;
        }
        alpha += a * w;
        weight_sum += w;
    }

    if weight_sum == 0.0 || alpha == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    Rgba([
        (color[0] / alpha).round().clamp(0.0, 255.0) as u8,
        (color[1] / alpha).round().clamp(0.0, 255.0) as u8,
        (color[2] / alpha).round().clamp(0.0, 255.0) as u8,
        (alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Mean RGB intensity; `opaque_only` restricts the mean to pixels with
/// non-zero alpha (used for the face, whose padding is transparent).
fn channel_means(img: &RgbaImage, opaque_only: bool) -> [f64; 3] {
    let mut sums = [0.0f64; 3];
    let mut count = 0u64;

    for pixel in img.pixels() {
        if opaque_only && pixel[3] == 0 {
            continue;
        }
        for c in 0..3 {
            sums[c] += pixel[c] as f64;
        }
        count += 1;
    }

    if count == 0 {
        return [128.0; 3];
    }
    [
        sums[0] / count as f64,
        sums[1] / count as f64,
        sums[2] / count as f64,
    ]
}

/// First-moment color correction: shift each face channel by the
/// difference of means so the composited region's average tone matches the
/// destination lighting.
fn shift_channels(img: &mut RgbaImage, target_mean: [f64; 3], source_mean: [f64; 3]) {
    let shift = [
        target_mean[0] - source_mean[0],
        target_mean[1] - source_mean[1],
        target_mean[2] - source_mean[2],
    ];

    for pixel in img.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (pixel[c] as f64 + shift[c]).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Multiply the global blend opacity and, when feathering is enabled, a
/// radial mask (opaque center, fully transparent at radius = min(w,h)/2)
/// into the alpha channel.
fn apply_alpha_mask(img: &mut RgbaImage, feather_radius: u32, blend_alpha: f64) {
    let (width, height) = img.dimensions();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = (width.min(height) as f64) / 2.0;
    let blend = blend_alpha.clamp(0.0, 1.0);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let mut factor = blend;
        if feather_radius > 0 && radius > 0.0 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            factor *= (1.0 - distance / radius).clamp(0.0, 1.0);
        }
        pixel[3] = (pixel[3] as f64 * factor).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn save_png(dir: &TempDir, name: &str, img: &RgbaImage) -> std::path::PathBuf {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    fn placement(width: u32, height: u32) -> FacePlacement {
        FacePlacement::full_range(4, 4, width, height)
    }

    #[test]
    fn cover_fit_resizes_to_placement() {
        let dir = TempDir::new().unwrap();
        let face = save_png(&dir, "face.png", &solid(100, 50, [200, 10, 10, 255]));

        let compositor =
            FrameCompositor::new(&face, &placement(40, 40), CompositeOptions::default()).unwrap();
        assert_eq!(compositor.face.dimensions(), (40, 40));
    }

    #[test]
    fn zero_size_region_is_rejected() {
        let dir = TempDir::new().unwrap();
        let face = save_png(&dir, "face.png", &solid(10, 10, [255, 255, 255, 255]));
        let bad = FacePlacement::full_range(0, 0, 0, 10);

        let err = FrameCompositor::new(&face, &bad, CompositeOptions::default()).unwrap_err();
        assert!(matches!(err, MediaError::Image(_)));
    }

    #[test]
    fn composite_blends_face_into_frame() {
        let dir = TempDir::new().unwrap();
        let face = save_png(&dir, "face.png", &solid(20, 20, [255, 0, 0, 255]));
        let frame = save_png(&dir, "frame.png", &solid(64, 64, [0, 0, 0, 255]));
        let out = dir.path().join("out.png");

        let options = CompositeOptions {
            feather_radius: 0,
            blend_alpha: 1.0,
            color_match: false,
        };
        let compositor = FrameCompositor::new(&face, &placement(20, 20), options).unwrap();
        compositor.composite(&frame, &out, None).unwrap();

        let result = image::open(&out).unwrap().to_rgba8();
        // Center of the placed face is red; far corner untouched.
        assert_eq!(result.get_pixel(14, 14)[0], 255);
        assert_eq!(*result.get_pixel(60, 60), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn feather_fades_region_edges() {
        let dir = TempDir::new().unwrap();
        let face = save_png(&dir, "face.png", &solid(20, 20, [255, 255, 255, 255]));
        let frame = save_png(&dir, "frame.png", &solid(64, 64, [0, 0, 0, 255]));
        let out = dir.path().join("out.png");

        let options = CompositeOptions {
            feather_radius: 15,
            blend_alpha: 1.0,
            color_match: false,
        };
        let compositor = FrameCompositor::new(&face, &placement(20, 20), options).unwrap();
        compositor.composite(&frame, &out, None).unwrap();

        let result = image::open(&out).unwrap().to_rgba8();
        // The placement corner lies beyond the feather radius: untouched.
        assert_eq!(*result.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
        // The center keeps most of the face.
        assert!(result.get_pixel(14, 14)[0] > 200);
    }

    #[test]
    fn color_match_shifts_toward_frame_mean() {
        let mut face = solid(10, 10, [100, 100, 100, 255]);
        let frame = solid(10, 10, [200, 50, 100, 255]);

        let frame_mean = channel_means(&frame, false);
        let face_mean = channel_means(&face, true);
        shift_channels(&mut face, frame_mean, face_mean);

        let p = face.get_pixel(5, 5);
        assert_eq!(p[0], 200);
        assert_eq!(p[1], 50);
        assert_eq!(p[2], 100);
    }

    #[test]
    fn rotation_quarter_turn_moves_pixels() {
        // Top edge red, rest blue; after 90 degrees clockwise the red edge
        // faces right.
        let mut src = solid(21, 21, [0, 0, 255, 255]);
        for x in 0..21 {
            src.put_pixel(x, 0, Rgba([255, 0, 0, 255]));
        }

        let rotated = rotate_about_center(&src, 90.0);
        assert!(rotated.get_pixel(20, 10)[0] > 200);
        assert!(rotated.get_pixel(10, 20)[2] > 200);
    }

    #[test]
    fn rotation_pads_with_transparency() {
        let src = solid(20, 20, [255, 255, 255, 255]);
        let rotated = rotate_about_center(&src, 45.0);
        // Square corners rotate out of the canvas; pads are transparent.
        assert_eq!(rotated.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn passthrough_copies_bytes_exactly() {
        let dir = TempDir::new().unwrap();
        let frame = save_png(&dir, "frame.png", &solid(32, 32, [1, 2, 3, 255]));
        let out = dir.path().join("out.png");

        let outcome = composite_or_copy(None, &frame, &out, None).unwrap();
        assert_eq!(outcome, CompositeOutcome::PassedThrough);
        assert_eq!(std::fs::read(&frame).unwrap(), std::fs::read(&out).unwrap());
    }

    #[test]
    fn unreadable_face_falls_back_to_passthrough() {
        let dir = TempDir::new().unwrap();
        let frame = save_png(&dir, "frame.png", &solid(32, 32, [9, 9, 9, 255]));
        let bogus = dir.path().join("missing-face.png");
        let out = dir.path().join("out.png");

        // Compositor construction fails; the caller composites without one.
        assert!(FrameCompositor::new(
            &bogus,
            &placement(10, 10),
            CompositeOptions::default()
        )
        .is_err());

        let outcome = composite_or_copy(None, &frame, &out, None).unwrap();
        assert_eq!(outcome, CompositeOutcome::PassedThrough);
    }
}
