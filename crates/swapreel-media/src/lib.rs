#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and frame compositing for Swapreel.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio watch channels
//! - Frame extraction, sequence assembly and audio muxing
//! - The per-frame face compositor (image-space blending)

pub mod command;
pub mod compositor;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{
    composite_or_copy, CompositeOptions, CompositeOutcome, FrameCompositor,
};
pub use error::{MediaError, MediaResult};
pub use frames::{
    assemble_video, extract_frames, frame_file_name, frame_pattern, list_frames, mux_audio,
    FrameProgress,
};
pub use fs_utils::move_file;
pub use probe::{has_audio_stream, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
