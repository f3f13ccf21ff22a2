use serde::{Deserialize, Serialize};

use super::field_value::FieldValue;
use crate::domain::value_objects::{FailureKind, RecordId};

/// A local edit discarded because the remote held a newer (or equally timed) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictOverwrite {
    pub record_id: RecordId,
    pub step: String,
    pub field: String,
    pub local: FieldValue,
    pub remote: FieldValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPassStatus {
    Completed,
    /// Another pass for the same scope was in flight; nothing was done.
    AlreadyRunning,
    /// Connectivity reported offline; nothing was attempted.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordSyncOutcome {
    Synced {
        pushed_fields: usize,
        conflicts: usize,
        assets_uploaded: usize,
    },
    Deleted,
    /// Nothing was due yet (backoff window) or the record awaits user attention.
    Deferred,
    Failed {
        kind: FailureKind,
        message: String,
        needs_attention: bool,
    },
}

impl RecordSyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RecordSyncOutcome::Synced { .. } | RecordSyncOutcome::Deleted
        )
    }
}

/// Aggregate of one `sync_all` pass; the only thing the UI needs for its banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncPassStatus,
    pub succeeded: u32,
    pub errors: u32,
    pub deferred: u32,
    pub conflicts: u32,
    pub needs_attention: Vec<RecordId>,
    pub last_error: Option<String>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl SyncReport {
    pub fn started(now: i64) -> Self {
        Self {
            status: SyncPassStatus::Completed,
            succeeded: 0,
            errors: 0,
            deferred: 0,
            conflicts: 0,
            needs_attention: Vec::new(),
            last_error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn skipped(status: SyncPassStatus, now: i64) -> Self {
        Self {
            status,
            ..Self::started(now)
        }
    }

    pub fn record(&mut self, record_id: &RecordId, outcome: &RecordSyncOutcome) {
        match outcome {
            RecordSyncOutcome::Synced { conflicts, .. } => {
                self.succeeded += 1;
                self.conflicts += *conflicts as u32;
            }
            RecordSyncOutcome::Deleted => self.succeeded += 1,
            RecordSyncOutcome::Deferred => self.deferred += 1,
            RecordSyncOutcome::Failed {
                message,
                needs_attention,
                ..
            } => {
                self.errors += 1;
                self.last_error = Some(message.clone());
                if *needs_attention {
                    self.needs_attention.push(record_id.clone());
                }
            }
        }
    }

    pub fn ran(&self) -> bool {
        self.status == SyncPassStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_aggregates_outcomes() {
        let id = RecordId::new("p-1".into()).unwrap();
        let mut report = SyncReport::started(0);
        report.record(
            &id,
            &RecordSyncOutcome::Synced {
                pushed_fields: 2,
                conflicts: 1,
                assets_uploaded: 0,
            },
        );
        report.record(
            &id,
            &RecordSyncOutcome::Failed {
                kind: FailureKind::Validation,
                message: "rejected".into(),
                needs_attention: true,
            },
        );
        report.record(&id, &RecordSyncOutcome::Deferred);

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.needs_attention, vec![id]);
        assert_eq!(report.last_error.as_deref(), Some("rejected"));
    }

    #[test]
    fn skipped_pass_is_not_reported_as_run() {
        let report = SyncReport::skipped(SyncPassStatus::AlreadyRunning, 5);
        assert!(!report.ran());
        assert_eq!(report.succeeded + report.errors, 0);
    }
}
