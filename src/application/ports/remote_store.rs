use crate::domain::entities::{AssetRef, PendingAsset, StepDataMap};
use crate::domain::value_objects::{OwnerScope, RecordId, RecordStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::domain::value_objects::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Remote unreachable: {0}")]
    Network(String),

    /// Elapsed budget in milliseconds.
    #[error("Remote call timed out after {0}ms")]
    Timeout(u64),

    #[error("Remote server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Remote rejected payload: {0}")]
    Validation(String),

    #[error("Remote record not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Network trouble and 5xx are transient; a rejected payload or a record the remote no
    /// longer knows will fail the same way until local data changes.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout(_) | RemoteError::Server { .. } => {
                FailureKind::Transient
            }
            RemoteError::Validation(_) | RemoteError::NotFound(_) => FailureKind::Validation,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Full document sent when a locally created record is first pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayload {
    pub id: RecordId,
    pub owner_scope: OwnerScope,
    pub status: RecordStatus,
    pub step_data: StepDataMap,
    pub created_at: i64,
}

/// Field-level diff: only fields whose local write beat the remote copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    pub fields: StepDataMap,
}

impl RecordDiff {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.fields.values().all(|step| step.is_empty())
    }
}

/// Remote snapshot with per-field timestamps preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: RecordId,
    pub owner_scope: OwnerScope,
    pub status: RecordStatus,
    pub step_data: StepDataMap,
    #[serde(default)]
    pub assets: Vec<AssetRef>,
    pub updated_at: i64,
}

/// Authoritative backend, always addressed under the caller's scope.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_record(
        &self,
        scope: &OwnerScope,
        payload: &RecordPayload,
    ) -> Result<RecordId, RemoteError>;

    async fn update_record(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        diff: &RecordDiff,
    ) -> Result<(), RemoteError>;

    /// `Ok(None)` when the remote has no such record.
    async fn get_record(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
    ) -> Result<Option<RemoteRecord>, RemoteError>;

    /// Must be idempotent on `asset.id`: a retried upload returns the existing reference.
    async fn upload_asset(
        &self,
        scope: &OwnerScope,
        record_id: &RecordId,
        asset: &PendingAsset,
    ) -> Result<AssetRef, RemoteError>;

    async fn delete_record(&self, scope: &OwnerScope, id: &RecordId) -> Result<(), RemoteError>;
}
