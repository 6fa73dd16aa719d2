//! The face-swap engine: job submission, status queries and lifecycle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use swapreel_models::{JobId, JobRecord, JobSnapshot, JobState, Template};

use crate::catalog::TemplateCatalog;
use crate::config::EngineConfig;
use crate::detector::DetectorCapability;
use crate::error::{EngineError, EngineResult};
use crate::logging::JobLogger;
use crate::pipeline::{self, JobContext};
use crate::quota::QuotaTracker;
use crate::store::JobStore;

type CancelMap = Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>;

/// Orchestrates face-swap jobs end to end.
///
/// Submission is synchronous and non-blocking: the job id is returned as
/// soon as the record is written in Queued, and the pipeline runs in an
/// independent background task. Jobs are fully isolated from each other;
/// the job map and quota map are the only shared state.
pub struct FaceSwapEngine {
    config: Arc<EngineConfig>,
    catalog: Arc<dyn TemplateCatalog>,
    detector: DetectorCapability,
    store: Arc<JobStore>,
    quota: Arc<QuotaTracker>,
    cancels: CancelMap,
}

impl FaceSwapEngine {
    /// Create an engine and start its quota sweeper.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn TemplateCatalog>,
        detector: DetectorCapability,
    ) -> Self {
        if let DetectorCapability::Unavailable(reason) = &detector {
            warn!(
                "Face detector unavailable ({}); placements composite without refinement",
                reason
            );
        }

        let quota = Arc::new(QuotaTracker::new(config.quota_window));
        quota.clone().spawn_sweeper(config.quota_sweep_interval);

        Self {
            config: Arc::new(config),
            catalog,
            detector,
            store: Arc::new(JobStore::new()),
            quota,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a new job.
    ///
    /// Fails synchronously with `QuotaExceeded` or `TemplateNotFound`; in
    /// both cases no job record is created. Otherwise the job is Queued
    /// and its pipeline spawned before this returns.
    pub async fn submit_job(
        &self,
        template_id: &str,
        user_image: impl Into<PathBuf>,
        caller_key: &str,
    ) -> EngineResult<JobId> {
        let decision = self.quota.check_quota(caller_key);
        if !decision.allowed {
            return Err(EngineError::QuotaExceeded {
                reset_at: decision.reset_at.unwrap_or_else(Utc::now),
            });
        }

        let template = self.catalog.get(template_id).await?;

        let job_id = JobId::new();
        self.store.insert(JobRecord::new(job_id.clone()));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.clone(), cancel_tx);

        info!(
            job_id = %job_id,
            template_id = %template_id,
            "Job accepted"
        );

        let runner = JobRunner {
            config: self.config.clone(),
            detector: self.detector.clone(),
            store: self.store.clone(),
            quota: self.quota.clone(),
            cancels: self.cancels.clone(),
        };
        let task_job_id = job_id.clone();
        let user_image = user_image.into();
        let caller_key = caller_key.to_string();
        tokio::spawn(async move {
            runner
                .run(task_job_id, template, user_image, caller_key, cancel_rx)
                .await;
        });

        Ok(job_id)
    }

    /// Number of job records tracked by this engine.
    pub fn job_count(&self) -> usize {
        self.store.len()
    }

    /// Full current status of a job as an atomic snapshot.
    pub async fn get_job_status(&self, job_id: &JobId) -> EngineResult<JobSnapshot> {
        self.store
            .snapshot(job_id)
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))
    }

    /// Output video location; valid only for completed jobs.
    pub async fn get_job_output(&self, job_id: &JobId) -> EngineResult<PathBuf> {
        let snapshot = self.get_job_status(job_id).await?;
        match (snapshot.state, snapshot.output_path) {
            (JobState::Completed, Some(path)) => Ok(path),
            _ => Err(EngineError::OutputNotAvailable(job_id.to_string())),
        }
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// The pipeline observes the flag between frames and stages; a
    /// terminal job is left untouched.
    pub async fn cancel_job(&self, job_id: &JobId) -> EngineResult<()> {
        if self.store.snapshot(job_id).is_none() {
            return Err(EngineError::JobNotFound(job_id.to_string()));
        }

        let cancels = self.cancels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = cancels.get(job_id) {
            let _ = sender.send(true);
            info!(job_id = %job_id, "Cancellation requested");
        }
        Ok(())
    }

    /// Stop the quota sweeper and signal cancellation to running jobs.
    pub async fn shutdown(&self) {
        self.quota.shutdown();
        let cancels = self.cancels.lock().unwrap_or_else(PoisonError::into_inner);
        for sender in cancels.values() {
            let _ = sender.send(true);
        }
    }
}

/// Owned handles a spawned job task needs to drive one job to a terminal
/// state without borrowing the engine.
struct JobRunner {
    config: Arc<EngineConfig>,
    detector: DetectorCapability,
    store: Arc<JobStore>,
    quota: Arc<QuotaTracker>,
    cancels: CancelMap,
}

impl JobRunner {
    async fn run(
        self,
        job_id: JobId,
        template: Arc<Template>,
        user_image: PathBuf,
        caller_key: String,
        cancel: watch::Receiver<bool>,
    ) {
        let logger = JobLogger::new(&job_id, "face_swap");

        // Processing is entered exactly once, before any I/O.
        self.store.update(&job_id, |r| r.start());
        logger.log_start(&format!("template {}", template.id));

        let ctx = JobContext {
            job_id: job_id.clone(),
            template,
            user_image,
            config: self.config.clone(),
            detector: self.detector.clone(),
            store: self.store.clone(),
            cancel,
        };

        match pipeline::run(ctx).await {
            Ok(output_path) => {
                self.store
                    .update(&job_id, |r| r.complete(output_path.clone()));
                // Quota is consumed only by a successful generation.
                self.quota.record_generation(&caller_key);
                metrics::counter!("swapreel_jobs_completed_total").increment(1);
                logger.log_completion(&format!("output at {}", output_path.display()));
            }
            Err(e) => {
                let message = e.to_string();
                self.store.update(&job_id, |r| r.fail(&message));
                logger.log_error(&message);
                metrics::counter!("swapreel_jobs_failed_total").increment(1);
                self.remove_partial_output(&job_id).await;
            }
        }

        self.cancels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);
    }

    /// Best-effort removal of a failed job's partial output artifact.
    async fn remove_partial_output(&self, job_id: &JobId) {
        let partial = self.config.output_dir.join(format!("{}.mp4", job_id));
        if partial.exists() {
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                warn!(
                    job_id = %job_id,
                    "Failed to remove partial output {}: {}",
                    partial.display(),
                    e
                );
            }
        }
    }
}
