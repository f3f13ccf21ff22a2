use crate::domain::entities::{
    AssetRef, PendingAsset, QueueEntry, QueuePayload, Record, StepDataMap, SyncMeta,
};
use crate::domain::value_objects::{
    FailureKind, OwnerScope, QueueOperation, RecordId, RecordStatus, SyncQueueId,
};
use crate::shared::error::AppError;
use sqlx::{Row, sqlite::SqliteRow};

/// JSON columns of a record row, serialized once so the size check and the write agree.
pub(super) struct EncodedRecord {
    pub step_data: String,
    pub pending_assets: String,
    pub assets: String,
}

impl EncodedRecord {
    pub fn encode(record: &Record, max_bytes: usize) -> Result<Self, AppError> {
        let encoded = Self {
            step_data: to_column(&record.step_data)?,
            pending_assets: to_column(&record.pending_assets)?,
            assets: to_column(&record.assets)?,
        };
        let size = encoded.len();
        if size > max_bytes {
            return Err(AppError::Storage(format!(
                "record {} is {size} bytes, limit is {max_bytes}",
                record.id
            )));
        }
        Ok(encoded)
    }

    fn len(&self) -> usize {
        self.step_data.len() + self.pending_assets.len() + self.assets.len()
    }
}

fn to_column<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::Storage(e.to_string()))
}

pub(super) fn map_record_row(row: &SqliteRow) -> Result<Record, AppError> {
    let id: String = row.try_get("id")?;
    let owner_scope: String = row.try_get("owner_scope")?;
    let status: String = row.try_get("status")?;
    let step_data: String = row.try_get("step_data")?;
    let pending_assets: String = row.try_get("pending_assets")?;
    let assets: String = row.try_get("assets")?;

    let step_data: StepDataMap = serde_json::from_str(&step_data)
        .map_err(|e| AppError::DeserializationError(format!("record {id} step_data: {e}")))?;
    let pending_assets: Vec<PendingAsset> = serde_json::from_str(&pending_assets).map_err(|e| {
        AppError::DeserializationError(format!("record {id} pending_assets: {e}"))
    })?;
    let assets: Vec<AssetRef> = serde_json::from_str(&assets)
        .map_err(|e| AppError::DeserializationError(format!("record {id} assets: {e}")))?;

    Ok(Record {
        status: RecordStatus::parse(&status).ok_or_else(|| {
            AppError::DeserializationError(format!("record {id} has unknown status {status}"))
        })?,
        owner_scope: OwnerScope::new(owner_scope).map_err(AppError::DeserializationError)?,
        step_data,
        pending_assets,
        assets,
        sync_meta: SyncMeta {
            last_synced_at: row.try_get("last_synced_at")?,
            is_dirty: row.try_get("is_dirty")?,
            is_new: row.try_get("is_new")?,
            needs_attention: row.try_get("needs_attention")?,
            last_error: row.try_get("last_error")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        id: RecordId::new(id).map_err(AppError::DeserializationError)?,
    })
}

pub(super) fn map_queue_row(row: &SqliteRow) -> Result<QueueEntry, AppError> {
    let id: i64 = row.try_get("id")?;
    let record_id: String = row.try_get("record_id")?;
    let owner_scope: String = row.try_get("owner_scope")?;
    let operation: String = row.try_get("operation")?;
    let payload: String = row.try_get("payload")?;
    let attempts: i64 = row.try_get("attempts")?;
    let last_error_kind: Option<String> = row.try_get("last_error_kind")?;

    let operation = QueueOperation::parse(&operation).ok_or_else(|| {
        AppError::DeserializationError(format!("queue entry {id} has unknown operation {operation}"))
    })?;
    let payload: QueuePayload = serde_json::from_str(&payload)
        .map_err(|e| AppError::DeserializationError(format!("queue entry {id} payload: {e}")))?;

    Ok(QueueEntry {
        id: SyncQueueId::new(id).map_err(AppError::DeserializationError)?,
        record_id: RecordId::new(record_id).map_err(AppError::DeserializationError)?,
        owner_scope: OwnerScope::new(owner_scope).map_err(AppError::DeserializationError)?,
        operation,
        payload,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        last_error: row.try_get("last_error")?,
        last_error_kind: last_error_kind.as_deref().and_then(FailureKind::parse),
        last_attempt_at: row.try_get("last_attempt_at")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        created_at: row.try_get("created_at")?,
    })
}
