use serde::{Deserialize, Serialize};

use super::step_data::StepDataMap;
use crate::domain::value_objects::{
    AssetId, FailureKind, OwnerScope, QueueOperation, RecordId, RecordStatus, SyncQueueId,
};

/// Serialized body of a queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuePayload {
    /// The full step data is read from the record when the create is sent.
    Create,
    /// Field-level diff as written locally.
    Update {
        #[serde(default)]
        fields: StepDataMap,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<RecordStatus>,
    },
    UploadAsset {
        asset_id: AssetId,
    },
    Delete,
}

impl QueuePayload {
    pub fn operation(&self) -> QueueOperation {
        match self {
            QueuePayload::Create => QueueOperation::Create,
            QueuePayload::Update { .. } => QueueOperation::Update,
            QueuePayload::UploadAsset { .. } => QueueOperation::UploadAsset,
            QueuePayload::Delete => QueueOperation::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntryDraft {
    pub record_id: RecordId,
    pub owner_scope: OwnerScope,
    pub payload: QueuePayload,
    pub created_at: i64,
}

impl QueueEntryDraft {
    pub fn new(
        record_id: RecordId,
        owner_scope: OwnerScope,
        payload: QueuePayload,
        created_at: i64,
    ) -> Self {
        Self {
            record_id,
            owner_scope,
            payload,
            created_at,
        }
    }

    pub fn operation(&self) -> QueueOperation {
        self.payload.operation()
    }
}

/// One outstanding operation destined for the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: SyncQueueId,
    pub record_id: RecordId,
    pub owner_scope: OwnerScope,
    pub operation: QueueOperation,
    pub payload: QueuePayload,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_error_kind: Option<FailureKind>,
    pub last_attempt_at: Option<i64>,
    pub next_attempt_at: i64,
    pub created_at: i64,
}

impl QueueEntry {
    pub fn is_ready(&self, now: i64) -> bool {
        self.next_attempt_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFailure {
    pub message: String,
    pub kind: FailureKind,
}

impl QueueFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = QueuePayload::UploadAsset {
            asset_id: AssetId::from_content(b"sig"),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "upload_asset");
        assert_eq!(payload.operation(), QueueOperation::UploadAsset);

        let create: QueuePayload = serde_json::from_value(json!({"kind": "create"})).unwrap();
        assert_eq!(create, QueuePayload::Create);
    }

    #[test]
    fn update_payload_tolerates_missing_status() {
        let payload: QueuePayload = serde_json::from_value(json!({
            "kind": "update",
            "fields": {"general": {"surface": {"value": 84, "updated_at": 5}}}
        }))
        .unwrap();
        match payload {
            QueuePayload::Update { fields, status } => {
                assert!(status.is_none());
                assert_eq!(fields["general"].get("surface").unwrap().updated_at, 5);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
