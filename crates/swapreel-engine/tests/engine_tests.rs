//! End-to-end engine tests with stub collaborators.
//!
//! These exercise submission, the job state machine and quota semantics
//! without requiring FFmpeg: jobs fail fast on a missing template video,
//! which is exactly the terminal path under test.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use swapreel_engine::{
    DetectorCapability, EngineConfig, EngineError, EngineResult, FaceDetector, FaceSwapEngine,
    InMemoryCatalog,
};
use swapreel_models::{FaceDetection, FacePlacement, JobId, JobSnapshot, JobState, Template};
use tempfile::TempDir;

/// A detector that finds no face in any image.
struct NoFaceDetector;

#[async_trait::async_trait]
impl FaceDetector for NoFaceDetector {
    async fn detect(&self, _image_path: &Path) -> EngineResult<Option<FaceDetection>> {
        Ok(None)
    }
}

fn test_template(dir: &TempDir) -> Template {
    Template {
        id: "t1".to_string(),
        name: "Test template".to_string(),
        // Points at a file that does not exist, so pipelines fail fast
        // without touching FFmpeg.
        video_path: dir.path().join("missing-template.mp4"),
        audio_path: None,
        fps: 30.0,
        total_frames: 300,
        placements: vec![FacePlacement::full_range(100, 100, 200, 200)],
    }
}

fn test_engine(dir: &TempDir, detector: DetectorCapability) -> FaceSwapEngine {
    let mut catalog = InMemoryCatalog::new();
    catalog.insert(test_template(dir));

    let config = EngineConfig {
        output_dir: dir.path().join("outputs"),
        work_dir: dir.path().join("work"),
        ..EngineConfig::default()
    };

    FaceSwapEngine::new(config, Arc::new(catalog), detector)
}

async fn wait_for_terminal(engine: &FaceSwapEngine, job_id: &JobId) -> JobSnapshot {
    for _ in 0..200 {
        let snapshot = engine.get_job_status(job_id).await.unwrap();
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}

#[tokio::test]
async fn unknown_template_rejected_without_job_record() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));

    let err = engine
        .submit_job("nope", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::TemplateNotFound(_)));
    assert_eq!(engine.job_count(), 0);
}

#[tokio::test]
async fn failing_job_reaches_failed_with_error() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));

    let job_id = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap();
    assert_eq!(engine.job_count(), 1);

    let snapshot = wait_for_terminal(&engine, &job_id).await;
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.error.is_some());
    assert!(snapshot.output_path.is_none());
    assert!(snapshot.completed_at.is_some());
}

#[tokio::test]
async fn failed_job_does_not_consume_quota() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));

    let first = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap();
    wait_for_terminal(&engine, &first).await;

    // The first job failed, so the same caller is still allowed.
    let second = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn output_unavailable_until_completed() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));

    let job_id = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap();

    let err = engine.get_job_output(&job_id).await.unwrap_err();
    assert!(matches!(err, EngineError::OutputNotAvailable(_)));

    // Still unavailable after the job fails.
    wait_for_terminal(&engine, &job_id).await;
    let err = engine.get_job_output(&job_id).await.unwrap_err();
    assert!(matches!(err, EngineError::OutputNotAvailable(_)));
}

#[tokio::test]
async fn user_image_without_face_fails_job() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::available(Arc::new(NoFaceDetector)));

    let job_id = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap();

    let snapshot = wait_for_terminal(&engine, &job_id).await;
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.error.unwrap().contains("no face detected"));
}

#[tokio::test]
async fn unknown_job_queries_fail() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));
    let unknown = JobId::from_string("does-not-exist");

    assert!(matches!(
        engine.get_job_status(&unknown).await.unwrap_err(),
        EngineError::JobNotFound(_)
    ));
    assert!(matches!(
        engine.get_job_output(&unknown).await.unwrap_err(),
        EngineError::JobNotFound(_) | EngineError::OutputNotAvailable(_)
    ));
    assert!(matches!(
        engine.cancel_job(&unknown).await.unwrap_err(),
        EngineError::JobNotFound(_)
    ));
}

#[tokio::test]
async fn terminal_state_is_stable_across_queries() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir, DetectorCapability::unavailable("not configured"));

    let job_id = engine
        .submit_job("t1", dir.path().join("face.png"), "caller-a")
        .await
        .unwrap();
    let first = wait_for_terminal(&engine, &job_id).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = engine.get_job_status(&job_id).await.unwrap();
    assert_eq!(first.state, second.state);
    assert_eq!(first.completed_at, second.completed_at);
}
