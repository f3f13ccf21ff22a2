use crate::domain::entities::{QueueEntry, QueueEntryDraft, QueueFailure};
use crate::domain::value_objects::{OwnerScope, RecordId, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable at-least-once log of operations bound for the remote store.
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    /// Appends with `attempts = 0`, eligible immediately.
    async fn enqueue(&self, draft: QueueEntryDraft) -> Result<SyncQueueId, AppError>;

    /// Entries whose backoff window has elapsed, oldest first, with each record's entries
    /// contiguous and in insertion order. Once a record hits an entry that is still backing
    /// off, its later entries are withheld so per-record ordering is never broken.
    async fn dequeue_ready(
        &self,
        now: i64,
        scope: Option<&OwnerScope>,
    ) -> Result<Vec<QueueEntry>, AppError>;

    async fn mark_succeeded(&self, id: SyncQueueId) -> Result<(), AppError>;

    /// Bumps `attempts`, stores the error and pushes `next_attempt_at` out by the backoff.
    async fn mark_failed(
        &self,
        id: SyncQueueId,
        failure: &QueueFailure,
        now: i64,
    ) -> Result<QueueEntry, AppError>;

    /// Distinct records with queued work or unsynced fields; served from indexes.
    async fn count_pending(&self, scope: &OwnerScope) -> Result<u64, AppError>;

    async fn entries_for_record(&self, record_id: &RecordId) -> Result<Vec<QueueEntry>, AppError>;

    async fn list_entries(&self, scope: Option<&OwnerScope>) -> Result<Vec<QueueEntry>, AppError>;
}
