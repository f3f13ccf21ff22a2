use super::record_store::RecordStore;
use super::sync_queue::SyncQueueStore;
use crate::domain::entities::{QueueEntryDraft, Record};
use crate::domain::value_objects::{RecordId, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Record store and queue sharing one transaction boundary.
#[async_trait]
pub trait LocalStore: RecordStore + SyncQueueStore {
    /// Persists the record and appends the drafts atomically.
    async fn commit_mutation(
        &self,
        record: &Record,
        drafts: Vec<QueueEntryDraft>,
    ) -> Result<Vec<SyncQueueId>, AppError>;

    /// Removes the record and its outstanding entries, optionally queueing a remote delete,
    /// in one transaction.
    async fn commit_deletion(
        &self,
        id: &RecordId,
        tombstone: Option<QueueEntryDraft>,
    ) -> Result<Option<SyncQueueId>, AppError>;

    /// Removes confirmed entries and persists the record with `is_dirty` recomputed against
    /// whatever is still queued. Returns the record as stored.
    async fn commit_sync(
        &self,
        record: Record,
        confirmed: &[SyncQueueId],
    ) -> Result<Record, AppError>;
}
