use crate::application::services::DriverStatus;
use crate::application::services::sync_service::SyncMetricsSnapshot;
use crate::domain::entities::{SyncPassStatus, SyncReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReportResponse {
    pub status: String,
    pub succeeded: u32,
    pub errors: u32,
    pub deferred: u32,
    pub conflicts: u32,
    pub needs_attention: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub duration_ms: i64,
    /// UI shows its warning banner when this is set.
    pub has_errors: bool,
}

impl From<&SyncReport> for SyncReportResponse {
    fn from(report: &SyncReport) -> Self {
        let status = match report.status {
            SyncPassStatus::Completed => "completed",
            SyncPassStatus::AlreadyRunning => "already_running",
            SyncPassStatus::Offline => "offline",
        };
        Self {
            status: status.to_string(),
            succeeded: report.succeeded,
            errors: report.errors,
            deferred: report.deferred,
            conflicts: report.conflicts,
            needs_attention: report
                .needs_attention
                .iter()
                .map(ToString::to_string)
                .collect(),
            last_error: report.last_error.clone(),
            duration_ms: (report.finished_at - report.started_at).max(0),
            has_errors: report.errors > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRecordRequest {
    pub owner_scope: String,
    pub record_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCountResponse {
    pub owner_scope: String,
    pub pending_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_at: Option<i64>,
    pub pending_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<SyncReportResponse>,
    pub metrics: SyncMetricsSnapshot,
}

impl SyncStatusResponse {
    pub fn new(status: DriverStatus, metrics: SyncMetricsSnapshot) -> Self {
        Self {
            is_online: status.is_online,
            is_syncing: status.is_syncing,
            last_sync_at: status.last_sync_at,
            pending_count: status.pending_count,
            last_report: status.last_report.as_ref().map(SyncReportResponse::from),
            metrics,
        }
    }
}
