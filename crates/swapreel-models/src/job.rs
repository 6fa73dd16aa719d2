//! Job records, progress and status snapshots.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// `Queued -> Processing -> {Completed | Failed}`; the terminal states are
/// never left once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, execution not yet started
    #[default]
    Queued,
    /// Pipeline is running
    Processing,
    /// Finished successfully; output available
    Completed,
    /// Aborted with an error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Pipeline stage a progress update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Decoding template frames to disk
    Extracting,
    /// Per-frame face compositing
    Compositing,
    /// Re-encoding frames into a video
    Assembling,
    /// Attaching the audio track
    MuxingAudio,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Extracting => "extracting",
            JobStage::Compositing => "compositing",
            JobStage::Assembling => "assembling",
            JobStage::MuxingAudio => "muxing_audio",
        }
    }
}

/// A progress update for a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    /// Current pipeline stage
    pub stage: JobStage,
    /// Overall percentage (0-100), monotonically non-decreasing per job
    pub percentage: f64,
    /// Current frame within the stage, when frame-granular
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<u64>,
    /// Total frames within the stage, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u64>,
}

impl JobProgress {
    /// Create a stage-only progress update.
    pub fn stage(stage: JobStage, percentage: f64) -> Self {
        Self {
            stage,
            percentage,
            current_frame: None,
            total_frames: None,
        }
    }

    /// Create a frame-granular progress update.
    pub fn frames(stage: JobStage, percentage: f64, current: u64, total: u64) -> Self {
        Self {
            stage,
            percentage,
            current_frame: Some(current),
            total_frames: Some(total),
        }
    }
}

/// The mutable job record, owned exclusively by the orchestrator task
/// driving the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Unique job ID
    pub id: JobId,
    /// Current lifecycle state
    pub state: JobState,
    /// Latest progress update (present only while or after Processing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    /// Error message (present iff Failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Output video path (present iff Completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Terminal-transition timestamp (set on Completed or Failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a fresh record in the Queued state.
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Queued,
            progress: None,
            error: None,
            output_path: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Enter the Processing state. No effect once terminal.
    pub fn start(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Processing;
    }

    /// Enter the Completed state, recording the output location.
    pub fn complete(&mut self, output_path: PathBuf) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Completed;
        self.output_path = Some(output_path);
        self.completed_at = Some(Utc::now());
        self.progress = Some(JobProgress::stage(JobStage::MuxingAudio, 100.0));
    }

    /// Enter the Failed state with the failing stage's message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Record a progress update.
    ///
    /// Percentages are clamped to [0, 100] and never decrease across the
    /// lifetime of the job, regardless of caller ordering. Ignored once the
    /// job is terminal.
    pub fn set_progress(&mut self, mut progress: JobProgress) {
        if self.state.is_terminal() {
            return;
        }
        progress.percentage = progress.percentage.clamp(0.0, 100.0);
        if let Some(previous) = &self.progress {
            progress.percentage = progress.percentage.max(previous.percentage);
        }
        self.progress = Some(progress);
    }

    /// Produce an immutable snapshot for status queries.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            state: self.state,
            progress: self.progress.clone(),
            error: self.error.clone(),
            output_path: self.output_path.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Immutable point-in-time view of a job, returned by status queries.
///
/// Read atomically: all fields come from a single locked read of the
/// record, so state and progress are never observed as a torn mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_queued() {
        let record = JobRecord::new(JobId::new());
        assert_eq!(record.state, JobState::Queued);
        assert!(record.progress.is_none());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn state_transitions() {
        let mut record = JobRecord::new(JobId::new());

        record.start();
        assert_eq!(record.state, JobState::Processing);

        record.complete(PathBuf::from("/outputs/x.mp4"));
        assert_eq!(record.state, JobState::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.progress.as_ref().unwrap().percentage, 100.0);
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut record = JobRecord::new(JobId::new());
        record.start();
        record.fail("boom");
        assert_eq!(record.state, JobState::Failed);

        record.start();
        record.complete(PathBuf::from("/outputs/x.mp4"));
        assert_eq!(record.state, JobState::Failed);
        assert!(record.output_path.is_none());
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn progress_is_monotone_and_clamped() {
        let mut record = JobRecord::new(JobId::new());
        record.start();

        record.set_progress(JobProgress::stage(JobStage::Extracting, 20.0));
        record.set_progress(JobProgress::stage(JobStage::Compositing, 10.0));
        assert_eq!(record.progress.as_ref().unwrap().percentage, 20.0);
        // Stage still advances even when the percentage is held.
        assert_eq!(record.progress.as_ref().unwrap().stage, JobStage::Compositing);

        record.set_progress(JobProgress::stage(JobStage::Compositing, 250.0));
        assert_eq!(record.progress.as_ref().unwrap().percentage, 100.0);
    }

    #[test]
    fn snapshot_serializes_states_snake_case() {
        let record = JobRecord::new(JobId::from_string("j1"));
        let json = serde_json::to_string(&record.snapshot()).unwrap();
        assert!(json.contains(r#""state":"queued""#));
        // Absent optionals are omitted entirely.
        assert!(!json.contains("output_path"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn snapshot_reflects_record() {
        let mut record = JobRecord::new(JobId::from_string("j1"));
        record.start();
        record.set_progress(JobProgress::frames(JobStage::Compositing, 50.0, 150, 300));

        let snap = record.snapshot();
        assert_eq!(snap.id.as_str(), "j1");
        assert_eq!(snap.state, JobState::Processing);
        assert_eq!(snap.progress.unwrap().current_frame, Some(150));
    }
}
