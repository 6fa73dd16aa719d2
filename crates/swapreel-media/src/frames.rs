//! Frame-level pipeline operations: extraction, assembly and audio mux.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info};

use swapreel_models::encoding::DEFAULT_AUDIO_CODEC;
use swapreel_models::CodecOptions;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{has_audio_stream, probe_video};

/// Prefix of extracted frame files.
pub const FRAME_PREFIX: &str = "frame_";
/// Zero-padded index width; keeps lexical order equal to temporal order
/// for any realistic frame count.
pub const FRAME_INDEX_WIDTH: usize = 6;

/// The ffmpeg file pattern for frames under `dir`.
pub fn frame_pattern(dir: &Path) -> PathBuf {
    dir.join(format!("{}%0{}d.png", FRAME_PREFIX, FRAME_INDEX_WIDTH))
}

/// File name of the frame with the given 1-based index.
pub fn frame_file_name(index: u64) -> String {
    format!("{}{:0width$}.png", FRAME_PREFIX, index, width = FRAME_INDEX_WIDTH)
}

/// Frame-granular progress for extraction and assembly.
#[derive(Debug, Clone, Copy)]
pub struct FrameProgress {
    pub current_frame: u64,
    pub total_frames: u64,
    /// Percentage in [0, 100]; 0 while the total is unknown
    pub percentage: f64,
}

/// Wrap a runner error into a stage error, preserving cancellation,
/// timeout and missing-tool identities.
fn stage_error(e: MediaError, wrap: fn(String) -> MediaError) -> MediaError {
    if e.is_environmental() {
        e
    } else {
        wrap(e.to_string())
    }
}

/// Decode `video` into one PNG per output tick of `fps`, resampling when
/// the native rate differs.
///
/// Frames land in `out_dir` named `frame_NNNNNN.png` so lexical sort order
/// equals temporal order; the returned paths are in ascending index order.
/// Progress is `current / ceil(duration * fps)` and never decreases.
pub async fn extract_frames<F>(
    video: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    fps: f64,
    on_progress: F,
    cancel: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
) -> MediaResult<Vec<PathBuf>>
where
    F: Fn(FrameProgress) + Send + 'static,
{
    let video = video.as_ref();
    let out_dir = out_dir.as_ref();

    let info = probe_video(video)
        .await
        .map_err(|e| stage_error(e, MediaError::ExtractionFailed))?;
    let total_frames = (info.duration * fps).ceil() as u64;

    tokio::fs::create_dir_all(out_dir).await?;

    let cmd = FfmpegCommand::new(video, frame_pattern(out_dir))
        .video_filter(format!("fps={}", fps));

    let mut runner = FfmpegRunner::new();
    if let Some(cancel) = cancel {
        runner = runner.with_cancel(cancel);
    }
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }

    runner
        .run_with_progress(&cmd, move |p| {
            on_progress(FrameProgress {
                current_frame: p.frame,
                total_frames,
                percentage: p.frame_percentage(total_frames),
            });
        })
        .await
        .map_err(|e| stage_error(e, MediaError::ExtractionFailed))?;

    let frames = list_frames(out_dir).await?;
    if frames.is_empty() {
        return Err(MediaError::extraction_failed("no frames produced"));
    }

    info!("Extracted {} frames from {}", frames.len(), video.display());
    Ok(frames)
}

/// List extracted frame files under `dir` in ascending index order.
pub async fn list_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(FRAME_PREFIX) && name.ends_with(".png") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}

/// Encode the frame sequence under `frames_dir` into a constant-frame-rate
/// video at `output`.
///
/// Dimensions are padded to even values as required by yuv420p H.264.
/// Fails with `AssemblyFailed` when the frame sequence is empty.
pub async fn assemble_video<F>(
    frames_dir: impl AsRef<Path>,
    output: impl AsRef<Path>,
    fps: f64,
    codec: &CodecOptions,
    on_progress: F,
    cancel: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
) -> MediaResult<()>
where
    F: Fn(FrameProgress) + Send + 'static,
{
    let frames_dir = frames_dir.as_ref();
    let output = output.as_ref();

    let total_frames = list_frames(frames_dir).await?.len() as u64;
    if total_frames == 0 {
        return Err(MediaError::assembly_failed("empty frame sequence"));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(frame_pattern(frames_dir), output)
        .input_args(["-framerate".to_string(), fps.to_string()])
        .video_filter("pad=ceil(iw/2)*2:ceil(ih/2)*2")
        .output_args(codec.to_ffmpeg_args());

    let mut runner = FfmpegRunner::new();
    if let Some(cancel) = cancel {
        runner = runner.with_cancel(cancel);
    }
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }

    runner
        .run_with_progress(&cmd, move |p| {
            on_progress(FrameProgress {
                current_frame: p.frame,
                total_frames,
                percentage: p.frame_percentage(total_frames),
            });
        })
        .await
        .map_err(|e| stage_error(e, MediaError::AssemblyFailed))?;

    debug!("Assembled {} frames into {}", total_frames, output.display());
    Ok(())
}

/// Copy the video stream of `video` verbatim and attach the audio track of
/// `audio_source`, re-encoded to AAC.
///
/// Durations are not reconciled: the container's longer stream determines
/// the output duration. Fails with `MuxFailed` when either input lacks the
/// required stream.
pub async fn mux_audio(
    video: impl AsRef<Path>,
    audio_source: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let audio_source = audio_source.as_ref();
    let output = output.as_ref();

    probe_video(video)
        .await
        .map_err(|e| stage_error(e, MediaError::MuxFailed))?;

    let audio_present = has_audio_stream(audio_source)
        .await
        .map_err(|e| stage_error(e, MediaError::MuxFailed))?;
    if !audio_present {
        return Err(MediaError::mux_failed(format!(
            "no audio stream in {}",
            audio_source.display()
        )));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(video, output)
        .add_input(audio_source)
        .video_codec("copy")
        .audio_codec(DEFAULT_AUDIO_CODEC)
        .map("0:v:0")
        .map("1:a:0");

    FfmpegRunner::new()
        .run(&cmd)
        .await
        .map_err(|e| stage_error(e, MediaError::MuxFailed))?;

    debug!("Muxed audio from {} into {}", audio_source.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn frame_names_sort_temporally() {
        let a = frame_file_name(1);
        let b = frame_file_name(99);
        let c = frame_file_name(100000);
        assert_eq!(a, "frame_000001.png");
        assert!(a < b && b < c);
    }

    #[test]
    fn frame_pattern_uses_fixed_width() {
        let pattern = frame_pattern(Path::new("/tmp/x"));
        assert_eq!(pattern, PathBuf::from("/tmp/x/frame_%06d.png"));
    }

    #[tokio::test]
    async fn assemble_empty_dir_fails() {
        let dir = TempDir::new().unwrap();
        let err = assemble_video(
            dir.path(),
            dir.path().join("out.mp4"),
            30.0,
            &CodecOptions::default(),
            |_| {},
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::AssemblyFailed(_)));
    }

    #[tokio::test]
    async fn list_frames_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        for index in [3u64, 1, 2] {
            tokio::fs::write(dir.path().join(frame_file_name(index)), b"x")
                .await
                .unwrap();
        }
        tokio::fs::write(dir.path().join("other.txt"), b"x")
            .await
            .unwrap();

        let frames = list_frames(dir.path()).await.unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].ends_with("frame_000001.png"));
        assert!(frames[2].ends_with("frame_000003.png"));
    }
}
