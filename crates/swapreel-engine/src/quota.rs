//! Per-caller generation quota tracking.
//!
//! One generation per caller key per window (24 hours by default). Records
//! live in memory; expiry is checked lazily on every read, and a periodic
//! sweeper bounds memory by removing expired entries. The sweeper is an
//! optimization only — quota answers are correct without it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Answer to a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    /// Whether a new job may be accepted
    pub allowed: bool,
    /// When the caller's quota resets, when currently denied
    pub reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct QuotaRecord {
    recorded_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// In-memory quota store keyed by caller fingerprint.
pub struct QuotaTracker {
    records: RwLock<HashMap<String, QuotaRecord>>,
    window: chrono::Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl QuotaTracker {
    /// Create a tracker with the given quota window.
    pub fn new(window: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
            sweeper: Mutex::new(None),
        }
    }

    /// Whether `caller_key` may start a new generation.
    ///
    /// Expired records are removed on the spot, so the answer never
    /// depends on the sweeper having run.
    pub fn check_quota(&self, caller_key: &str) -> QuotaDecision {
        let now = Utc::now();

        let expired = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            match records.get(caller_key) {
                None => {
                    return QuotaDecision {
                        allowed: true,
                        reset_at: None,
                    }
                }
                Some(record) if now > record.expires_at => true,
                Some(record) => {
                    return QuotaDecision {
                        allowed: false,
                        reset_at: Some(record.expires_at),
                    }
                }
            }
        };

        if expired {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            if records
                .get(caller_key)
                .is_some_and(|record| now > record.expires_at)
            {
                records.remove(caller_key);
            }
        }

        QuotaDecision {
            allowed: true,
            reset_at: None,
        }
    }

    /// Record a completed generation for `caller_key`, replacing any
    /// previous record.
    pub fn record_generation(&self, caller_key: &str) {
        let now = Utc::now();
        let record = QuotaRecord {
            recorded_at: now,
            expires_at: now + self.window,
        };

        debug!(
            "Recorded generation for caller {} at {}, expires {}",
            caller_key, record.recorded_at, record.expires_at
        );
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(caller_key.to_string(), record);
    }

    /// Remove expired records; returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| now <= record.expires_at);
        let removed = before - records.len();
        if removed > 0 {
            info!("Swept {} expired quota records", removed);
        }
        removed
    }

    /// Number of live records (expired entries included until swept).
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweeper. Replaces any previous sweeper task.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) {
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracker.sweep_expired();
            }
        });

        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = sweeper.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the periodic sweeper.
    pub fn shutdown(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = sweeper.take() {
            handle.abort();
        }
    }
}

impl Drop for QuotaTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_caller_is_allowed() {
        let tracker = QuotaTracker::new(Duration::from_secs(60));
        let decision = tracker.check_quota("caller-1");
        assert!(decision.allowed);
        assert!(decision.reset_at.is_none());
    }

    #[test]
    fn recorded_generation_denies_immediately() {
        let tracker = QuotaTracker::new(Duration::from_secs(60));
        tracker.record_generation("caller-1");

        let decision = tracker.check_quota("caller-1");
        assert!(!decision.allowed);
        assert!(decision.reset_at.is_some());

        // Other callers are unaffected.
        assert!(tracker.check_quota("caller-2").allowed);
    }

    #[tokio::test]
    async fn quota_expires_without_sweeper() {
        let tracker = QuotaTracker::new(Duration::from_millis(20));
        tracker.record_generation("caller-1");
        assert!(!tracker.check_quota("caller-1").allowed);

        tokio::time::sleep(Duration::from_millis(40)).await;

        // Lazy expiry on read, no sweeper involved.
        assert!(tracker.check_quota("caller-1").allowed);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn sweeper_removes_expired_records() {
        let tracker = Arc::new(QuotaTracker::new(Duration::from_millis(10)));
        tracker.record_generation("caller-1");
        tracker.record_generation("caller-2");
        assert_eq!(tracker.len(), 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tracker.sweep_expired(), 2);
        assert!(tracker.is_empty());
    }

    #[test]
    fn rerecord_overwrites_existing_entry() {
        let tracker = QuotaTracker::new(Duration::from_secs(60));
        tracker.record_generation("caller-1");
        let first = tracker.check_quota("caller-1").reset_at.unwrap();

        tracker.record_generation("caller-1");
        let second = tracker.check_quota("caller-1").reset_at.unwrap();
        assert!(second >= first);
        assert_eq!(tracker.len(), 1);
    }
}
