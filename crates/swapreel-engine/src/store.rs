//! In-memory job store with atomic snapshots.
//!
//! A process-wide concurrent map keyed by job id. Records are mutated only
//! by the orchestrator task driving the job; readers always get a full
//! snapshot taken under a single lock acquisition, never a torn mix of
//! old status and new progress. Records are never deleted here; retention
//! is an external concern.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use swapreel_models::{JobId, JobRecord, JobSnapshot};

/// Concurrent job-record map.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record.
    pub fn insert(&self, record: JobRecord) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record);
    }

    /// Atomic point-in-time snapshot of a job.
    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(JobRecord::snapshot)
    }

    /// Mutate a record in place under the write lock.
    ///
    /// Returns false when the id is unknown.
    pub fn update<F>(&self, id: &JobId, mutate: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.get_mut(id) {
            Some(record) => {
                mutate(record);
                true
            }
            None => false,
        }
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use swapreel_models::{JobProgress, JobStage, JobState};

    #[test]
    fn insert_and_snapshot() {
        let store = JobStore::new();
        let id = JobId::from_string("j1");
        store.insert(JobRecord::new(id.clone()));

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.state, JobState::Queued);
        assert!(store.snapshot(&JobId::from_string("other")).is_none());
    }

    #[test]
    fn update_mutates_under_lock() {
        let store = JobStore::new();
        let id = JobId::from_string("j1");
        store.insert(JobRecord::new(id.clone()));

        assert!(store.update(&id, |r| {
            r.start();
            r.set_progress(JobProgress::stage(JobStage::Extracting, 10.0));
        }));

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.state, JobState::Processing);
        assert_eq!(snap.progress.unwrap().percentage, 10.0);

        assert!(!store.update(&JobId::from_string("missing"), |_| {}));
    }

    #[test]
    fn snapshot_is_not_torn_across_terminal_write() {
        let store = JobStore::new();
        let id = JobId::from_string("j1");
        store.insert(JobRecord::new(id.clone()));

        store.update(&id, |r| {
            r.start();
            r.complete(PathBuf::from("/outputs/j1.mp4"));
        });

        let snap = store.snapshot(&id).unwrap();
        // Completed state always comes with its output and 100%.
        assert_eq!(snap.state, JobState::Completed);
        assert!(snap.output_path.is_some());
        assert_eq!(snap.progress.unwrap().percentage, 100.0);
    }
}
