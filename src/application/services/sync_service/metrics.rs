use crate::domain::entities::SyncReport;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcomeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_passes: u64,
    pub skipped_passes: u64,
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub conflicts_overwritten: u64,
    pub consecutive_failed_passes: u64,
    pub last_outcome: Option<PassOutcomeStatus>,
    pub last_pass_started_ms: Option<i64>,
    pub last_pass_finished_ms: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct LastPass {
    outcome: Option<PassOutcomeStatus>,
    started_ms: Option<i64>,
    finished_ms: Option<i64>,
    error: Option<String>,
}

/// Counters for one synchronizer instance.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    passes: AtomicU64,
    skipped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    conflicts: AtomicU64,
    consecutive_failed: AtomicU64,
    last: Mutex<LastPass>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&self, report: &SyncReport) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.succeeded
            .fetch_add(u64::from(report.succeeded), Ordering::Relaxed);
        self.failed.fetch_add(u64::from(report.errors), Ordering::Relaxed);

        let outcome = if report.errors == 0 {
            self.consecutive_failed.store(0, Ordering::Relaxed);
            PassOutcomeStatus::Success
        } else {
            self.consecutive_failed.fetch_add(1, Ordering::Relaxed);
            PassOutcomeStatus::Failure
        };

        if let Ok(mut last) = self.last.lock() {
            last.outcome = Some(outcome);
            last.started_ms = Some(report.started_at);
            last.finished_ms = Some(report.finished_at);
            last.error = report.last_error.clone();
        }
    }

    /// A pass that could not complete (local storage failure).
    pub fn record_aborted(&self, started_ms: i64, error: &str) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last.lock() {
            last.outcome = Some(PassOutcomeStatus::Failure);
            last.started_ms = Some(started_ms);
            last.finished_ms = None;
            last.error = Some(error.to_string());
        }
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflicts(&self, count: usize) {
        self.conflicts.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let last = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        SyncMetricsSnapshot {
            total_passes: self.passes.load(Ordering::Relaxed),
            skipped_passes: self.skipped.load(Ordering::Relaxed),
            records_succeeded: self.succeeded.load(Ordering::Relaxed),
            records_failed: self.failed.load(Ordering::Relaxed),
            conflicts_overwritten: self.conflicts.load(Ordering::Relaxed),
            consecutive_failed_passes: self.consecutive_failed.load(Ordering::Relaxed),
            last_outcome: last.outcome,
            last_pass_started_ms: last.started_ms,
            last_pass_finished_ms: last.finished_ms,
            last_error: last.error,
        }
    }
}
