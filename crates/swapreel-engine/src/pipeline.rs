//! Per-job processing pipeline.
//!
//! Stages run in sequence within the job's own task: frame extraction,
//! per-frame compositing (bounded parallelism, index-ordered output),
//! sequence assembly, audio mux, and a final move into the output
//! directory. The working directory is a scoped temp dir released on
//! every exit path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

use swapreel_media::{
    assemble_video, composite_or_copy, extract_frames, move_file, mux_audio, CompositeOutcome,
    FrameCompositor, MediaError,
};
use swapreel_models::{
    compute_transform, CodecOptions, JobId, JobProgress, JobStage, Point, Template,
};

use crate::config::EngineConfig;
use crate::detector::DetectorCapability;
use crate::error::{EngineError, EngineResult};
use crate::logging::JobLogger;
use crate::store::JobStore;

/// Everything a job's background task needs to run the pipeline.
pub(crate) struct JobContext {
    pub job_id: JobId,
    pub template: Arc<Template>,
    pub user_image: PathBuf,
    pub config: Arc<EngineConfig>,
    pub detector: DetectorCapability,
    pub store: Arc<JobStore>,
    pub cancel: watch::Receiver<bool>,
}

/// Map a stage-local percentage into the job-wide band for that stage.
///
/// Bands mirror the relative cost of each stage: extraction 0-25,
/// compositing 25-75, assembly 75-80, audio mux 80-100.
fn band(start: f64, end: f64, stage_pct: f64) -> f64 {
    start + (end - start) * (stage_pct.clamp(0.0, 100.0) / 100.0)
}

/// Run the full pipeline for one job, returning the final output path.
pub(crate) async fn run(ctx: JobContext) -> EngineResult<PathBuf> {
    let logger = JobLogger::new(&ctx.job_id, "face_swap");

    ensure_not_cancelled(&ctx.cancel)?;

    // The user face is validated up front when detection is available: a
    // photo with no usable face fails the job before any decoding starts.
    let user_landmarks = detect_user_landmarks(&ctx).await?;

    tokio::fs::create_dir_all(&ctx.config.work_dir).await?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("job-{}-", ctx.job_id))
        .tempdir_in(&ctx.config.work_dir)?;
    let frames_dir = work_dir.path().join("frames");
    let processed_dir = work_dir.path().join("processed");
    tokio::fs::create_dir_all(&processed_dir).await?;

    // Stage 1/4: frame extraction.
    logger.log_stage("extracting", "Extracting frames from template video");
    let frames = {
        let store = ctx.store.clone();
        let job_id = ctx.job_id.clone();
        extract_frames(
            &ctx.template.video_path,
            &frames_dir,
            ctx.template.fps,
            move |p| {
                store.update(&job_id, |r| {
                    r.set_progress(JobProgress::frames(
                        JobStage::Extracting,
                        band(0.0, 25.0, p.percentage),
                        p.current_frame,
                        p.total_frames,
                    ));
                });
            },
            Some(ctx.cancel.clone()),
            ctx.config.ffmpeg_timeout_secs,
        )
        .await?
    };

    // Stage 2/4: per-frame compositing.
    ensure_not_cancelled(&ctx.cancel)?;
    logger.log_stage("compositing", "Compositing face onto frames");
    ctx.store.update(&ctx.job_id, |r| {
        r.set_progress(JobProgress::stage(JobStage::Compositing, 25.0));
    });
    let passed_through = composite_frames(&ctx, &frames, &processed_dir, user_landmarks).await?;
    if passed_through > 0 {
        logger.log_warning(&format!(
            "{} of {} frames passed through unmodified",
            passed_through,
            frames.len()
        ));
    }

    // Stage 3/4: re-assembly into a video.
    ensure_not_cancelled(&ctx.cancel)?;
    logger.log_stage("assembling", "Encoding processed frames");
    let assembled = work_dir.path().join("video.mp4");
    {
        let store = ctx.store.clone();
        let job_id = ctx.job_id.clone();
        assemble_video(
            &processed_dir,
            &assembled,
            ctx.template.fps,
            &CodecOptions::default(),
            move |p| {
                store.update(&job_id, |r| {
                    r.set_progress(JobProgress::frames(
                        JobStage::Assembling,
                        band(75.0, 80.0, p.percentage),
                        p.current_frame,
                        p.total_frames,
                    ));
                });
            },
            Some(ctx.cancel.clone()),
            ctx.config.ffmpeg_timeout_secs,
        )
        .await?
    };

    // Stage 4/4: audio mux and move into the output directory.
    ensure_not_cancelled(&ctx.cancel)?;
    logger.log_stage("muxing_audio", "Attaching template audio");
    ctx.store.update(&ctx.job_id, |r| {
        r.set_progress(JobProgress::stage(JobStage::MuxingAudio, 80.0));
    });
    let muxed = work_dir.path().join("final.mp4");
    mux_audio(&assembled, ctx.template.audio_source(), &muxed).await?;

    let output_path = ctx
        .config
        .output_dir
        .join(format!("{}.mp4", ctx.job_id));
    move_file(&muxed, &output_path).await?;

    Ok(output_path)
    // work_dir drops here, removing frames and intermediates on every path.
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> EngineResult<()> {
    if *cancel.borrow() {
        return Err(EngineError::Media(MediaError::Cancelled));
    }
    Ok(())
}

/// Landmarks of the user face, when a detector is available.
///
/// A detector reporting no face in the *user image* is terminal; sparse
/// landmarks merely disable per-frame rotation refinement.
async fn detect_user_landmarks(ctx: &JobContext) -> EngineResult<Option<Arc<Vec<Point>>>> {
    let detector = match ctx.detector.get() {
        Some(detector) => detector,
        None => return Ok(None),
    };

    match detector.detect(&ctx.user_image).await? {
        Some(detection) if detection.has_landmarks() => Ok(Some(Arc::new(detection.landmarks))),
        Some(_) => Ok(None),
        None => Err(EngineError::NoFaceDetected(
            ctx.user_image.display().to_string(),
        )),
    }
}

/// Composite every frame into `processed_dir`, preserving index order by
/// file name regardless of completion order.
///
/// Returns the number of frames that passed through unmodified (soft
/// failures and frames with no face or placement).
async fn composite_frames(
    ctx: &JobContext,
    frames: &[PathBuf],
    processed_dir: &std::path::Path,
    user_landmarks: Option<Arc<Vec<Point>>>,
) -> EngineResult<u64> {
    let total = frames.len() as u64;
    let compositors = build_compositors(ctx).await?;

    let semaphore = Arc::new(Semaphore::new(ctx.config.frame_parallelism.max(1)));
    let done = Arc::new(AtomicU64::new(0));
    let mut tasks: JoinSet<EngineResult<CompositeOutcome>> = JoinSet::new();
    let mut passed_through = 0u64;

    for (index, frame_path) in frames.iter().enumerate() {
        ensure_not_cancelled(&ctx.cancel)?;

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::pipeline("frame worker pool closed"))?;

        let compositor = ctx
            .template
            .placement_index(index as u64)
            .and_then(|i| compositors.get(&i).cloned().flatten());
        let detector = ctx.detector.get().cloned();
        let source_landmarks = user_landmarks.clone();
        let frame_path = frame_path.clone();
        let output_path = processed_dir.join(
            frame_path
                .file_name()
                .ok_or_else(|| EngineError::pipeline("frame path has no file name"))?,
        );
        let store = ctx.store.clone();
        let job_id = ctx.job_id.clone();
        let done = done.clone();

        tasks.spawn(async move {
            let _permit = permit;

            let mut skip_face = false;
            let mut rotation = None;
            if let Some(detector) = &detector {
                match detector.detect(&frame_path).await {
                    // No face in this template frame: pass it through.
                    Ok(None) => skip_face = true,
                    Ok(Some(found)) => {
                        if let (Some(source), true) =
                            (&source_landmarks, found.has_landmarks())
                        {
                            match compute_transform(source.as_slice(), &found.landmarks) {
                                Ok(transform) => {
                                    rotation = Some(transform.rotation_degrees());
                                }
                                Err(e) => {
                                    warn!(
                                        "Transform failed for {}: {}",
                                        frame_path.display(),
                                        e
                                    );
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Detection failed for {}: {}", frame_path.display(), e);
                    }
                }
            }

            let active = if skip_face { None } else { compositor };
            let outcome = tokio::task::spawn_blocking(move || {
                composite_or_copy(active.as_deref(), &frame_path, &output_path, rotation)
            })
            .await
            .map_err(|_| EngineError::pipeline("frame compositing task panicked"))??;

            let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
            store.update(&job_id, |r| {
                r.set_progress(JobProgress::frames(
                    JobStage::Compositing,
                    band(25.0, 75.0, completed as f64 / total as f64 * 100.0),
                    completed,
                    total,
                ));
            });

            Ok(outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|_| EngineError::pipeline("frame task aborted"))??;
        if outcome == CompositeOutcome::PassedThrough {
            passed_through += 1;
        }
    }

    metrics::counter!("swapreel_frames_passed_through_total").increment(passed_through);
    Ok(passed_through)
}

/// Prepare one compositor per placement. A placement whose face
/// preparation fails maps to `None` and its frames pass through.
async fn build_compositors(
    ctx: &JobContext,
) -> EngineResult<HashMap<usize, Option<Arc<FrameCompositor>>>> {
    let template = ctx.template.clone();
    let user_image = ctx.user_image.clone();
    let options = ctx.config.composite;

    let compositors = tokio::task::spawn_blocking(move || {
        let mut map = HashMap::new();
        for (index, placement) in template.placements.iter().enumerate() {
            let compositor = match FrameCompositor::new(&user_image, placement, options) {
                Ok(compositor) => Some(Arc::new(compositor)),
                Err(e) => {
                    warn!("Face preparation failed for placement {}: {}", index, e);
                    None
                }
            };
            map.insert(index, compositor);
        }
        map
    })
    .await
    .map_err(|_| EngineError::pipeline("face preparation task panicked"))?;

    Ok(compositors)
}
