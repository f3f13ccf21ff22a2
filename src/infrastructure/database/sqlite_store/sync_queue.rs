use super::SqliteLocalStore;
use super::mapper::map_queue_row;
use super::queries::{
    COUNT_PENDING_RECORDS, DELETE_QUEUE_ENTRY, INSERT_QUEUE_ENTRY, SELECT_QUEUE_ENTRIES,
    SELECT_QUEUE_ENTRIES_BY_RECORD, SELECT_QUEUE_ENTRIES_BY_SCOPE, SELECT_QUEUE_ENTRY_BY_ID,
    UPDATE_QUEUE_FAILURE,
};
use crate::application::ports::sync_queue::SyncQueueStore;
use crate::domain::entities::{QueueEntry, QueueEntryDraft, QueueFailure};
use crate::domain::value_objects::{OwnerScope, RecordId, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Executor, Row, Sqlite};
use std::collections::HashMap;

pub(super) async fn insert_entry<'e, E>(
    executor: E,
    draft: &QueueEntryDraft,
) -> Result<SyncQueueId, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&draft.payload)
        .map_err(|e| AppError::Storage(format!("queue payload: {e}")))?;

    let result = sqlx::query(INSERT_QUEUE_ENTRY)
        .bind(draft.record_id.as_str())
        .bind(draft.owner_scope.as_str())
        .bind(draft.operation().as_str())
        .bind(payload)
        .bind(draft.created_at)
        .execute(executor)
        .await?;

    SyncQueueId::new(result.last_insert_rowid()).map_err(AppError::Database)
}

/// Keeps each record's entries together, ordered by the record's oldest entry, and cuts a
/// record's run at its first entry that is still backing off.
fn ready_in_record_order(entries: Vec<QueueEntry>, now: i64) -> Vec<QueueEntry> {
    struct Run {
        ready: Vec<QueueEntry>,
        blocked: bool,
    }

    let mut order: Vec<RecordId> = Vec::new();
    let mut runs: HashMap<RecordId, Run> = HashMap::new();

    for entry in entries {
        let run = runs.entry(entry.record_id.clone()).or_insert_with(|| {
            order.push(entry.record_id.clone());
            Run {
                ready: Vec::new(),
                blocked: false,
            }
        });
        if run.blocked {
            continue;
        }
        if entry.is_ready(now) {
            run.ready.push(entry);
        } else {
            run.blocked = true;
        }
    }

    order
        .into_iter()
        .filter_map(|id| runs.remove(&id))
        .flat_map(|run| run.ready)
        .collect()
}

#[async_trait]
impl SyncQueueStore for SqliteLocalStore {
    async fn enqueue(&self, draft: QueueEntryDraft) -> Result<SyncQueueId, AppError> {
        let id = insert_entry(self.pool.get_pool(), &draft).await?;
        tracing::debug!(
            target: "sync::queue",
            entry_id = id.value(),
            record_id = %draft.record_id,
            operation = draft.operation().as_str(),
            "queued"
        );
        Ok(id)
    }

    async fn dequeue_ready(
        &self,
        now: i64,
        scope: Option<&OwnerScope>,
    ) -> Result<Vec<QueueEntry>, AppError> {
        let entries = self.list_entries(scope).await?;
        Ok(ready_in_record_order(entries, now))
    }

    async fn mark_succeeded(&self, id: SyncQueueId) -> Result<(), AppError> {
        sqlx::query(DELETE_QUEUE_ENTRY)
            .bind(id.value())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: SyncQueueId,
        failure: &QueueFailure,
        now: i64,
    ) -> Result<QueueEntry, AppError> {
        let row = sqlx::query(SELECT_QUEUE_ENTRY_BY_ID)
            .bind(id.value())
            .fetch_optional(self.pool.get_pool())
            .await?
            .ok_or_else(|| AppError::not_found("queue entry", id))?;
        let mut entry = map_queue_row(&row)?;

        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_error = Some(failure.message.clone());
        entry.last_error_kind = Some(failure.kind);
        entry.last_attempt_at = Some(now);
        entry.next_attempt_at = self.retry_policy.next_attempt_at(entry.attempts, now);

        sqlx::query(UPDATE_QUEUE_FAILURE)
            .bind(id.value())
            .bind(i64::from(entry.attempts))
            .bind(&failure.message)
            .bind(failure.kind.as_str())
            .bind(now)
            .bind(entry.next_attempt_at)
            .execute(self.pool.get_pool())
            .await?;

        tracing::debug!(
            target: "sync::queue",
            entry_id = id.value(),
            record_id = %entry.record_id,
            attempts = entry.attempts,
            kind = failure.kind.as_str(),
            next_attempt_at = entry.next_attempt_at,
            "entry failed, backing off"
        );
        Ok(entry)
    }

    async fn count_pending(&self, scope: &OwnerScope) -> Result<u64, AppError> {
        let count: i64 = sqlx::query(COUNT_PENDING_RECORDS)
            .bind(scope.as_str())
            .fetch_one(self.pool.get_pool())
            .await?
            .try_get("count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn entries_for_record(&self, record_id: &RecordId) -> Result<Vec<QueueEntry>, AppError> {
        let rows = sqlx::query(SELECT_QUEUE_ENTRIES_BY_RECORD)
            .bind(record_id.as_str())
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.iter().map(map_queue_row).collect()
    }

    async fn list_entries(&self, scope: Option<&OwnerScope>) -> Result<Vec<QueueEntry>, AppError> {
        let rows = match scope {
            Some(scope) => {
                sqlx::query(SELECT_QUEUE_ENTRIES_BY_SCOPE)
                    .bind(scope.as_str())
                    .fetch_all(self.pool.get_pool())
                    .await?
            }
            None => {
                sqlx::query(SELECT_QUEUE_ENTRIES)
                    .fetch_all(self.pool.get_pool())
                    .await?
            }
        };
        rows.iter().map(map_queue_row).collect()
    }
}
