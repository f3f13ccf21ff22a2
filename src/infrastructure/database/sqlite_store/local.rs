use super::SqliteLocalStore;
use super::mapper::EncodedRecord;
use super::queries::{
    COUNT_QUEUE_ENTRIES_BY_RECORD, DELETE_QUEUE_ENTRIES_BY_RECORD, DELETE_QUEUE_ENTRY,
    DELETE_RECORD,
};
use super::records::upsert_record;
use super::sync_queue::insert_entry;
use crate::application::ports::local_store::LocalStore;
use crate::domain::entities::{QueueEntryDraft, Record};
use crate::domain::value_objects::{RecordId, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn commit_mutation(
        &self,
        record: &Record,
        drafts: Vec<QueueEntryDraft>,
    ) -> Result<Vec<SyncQueueId>, AppError> {
        let encoded = EncodedRecord::encode(record, self.max_record_bytes)?;
        let mut tx = self.pool.get_pool().begin().await?;

        upsert_record(&mut *tx, record, &encoded).await?;
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            ids.push(insert_entry(&mut *tx, draft).await?);
        }

        tx.commit().await?;

        tracing::debug!(
            target: "sync::store",
            record_id = %record.id,
            queued = ids.len(),
            "record committed"
        );
        Ok(ids)
    }

    async fn commit_deletion(
        &self,
        id: &RecordId,
        tombstone: Option<QueueEntryDraft>,
    ) -> Result<Option<SyncQueueId>, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query(DELETE_QUEUE_ENTRIES_BY_RECORD)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(DELETE_RECORD)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let queued = match tombstone.as_ref() {
            Some(draft) => Some(insert_entry(&mut *tx, draft).await?),
            None => None,
        };

        tx.commit().await?;

        tracing::debug!(
            target: "sync::store",
            record_id = %id,
            tombstone = queued.is_some(),
            "record deleted locally"
        );
        Ok(queued)
    }

    async fn commit_sync(
        &self,
        mut record: Record,
        confirmed: &[SyncQueueId],
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        for id in confirmed {
            sqlx::query(DELETE_QUEUE_ENTRY)
                .bind(id.value())
                .execute(&mut *tx)
                .await?;
        }

        let remaining: i64 = sqlx::query(COUNT_QUEUE_ENTRIES_BY_RECORD)
            .bind(record.id.as_str())
            .fetch_one(&mut *tx)
            .await?
            .try_get("count")?;
        record.recompute_dirty(remaining > 0);

        let encoded = EncodedRecord::encode(&record, self.max_record_bytes)?;
        upsert_record(&mut *tx, &record, &encoded).await?;

        tx.commit().await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::record_store::{RecordFilter, RecordStore};
    use crate::application::ports::sync_queue::SyncQueueStore;
    use crate::domain::entities::{FieldValue, QueueFailure, QueuePayload, StepData};
    use crate::domain::retry_policy::RetryPolicy;
    use crate::domain::value_objects::{FailureKind, OwnerScope, RecordStatus};
    use crate::infrastructure::database::ConnectionPool;
    use serde_json::json;

    async fn setup_store(max_record_bytes: usize) -> SqliteLocalStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        let store = SqliteLocalStore::new(
            pool,
            RetryPolicy::new(1_000, 8_000).with_jitter(0.0),
            max_record_bytes,
        );
        store.initialize().await.unwrap();
        store
    }

    fn scope() -> OwnerScope {
        OwnerScope::new("org-1".into()).unwrap()
    }

    fn record_at(updated_at: i64) -> Record {
        let mut record = Record::new_local(scope(), updated_at);
        let mut step = StepData::new();
        step.insert("surface", FieldValue::new(json!(84.5), updated_at));
        record.step_data.insert("general".into(), step);
        record
    }

    fn update_draft(record: &Record, now: i64) -> QueueEntryDraft {
        QueueEntryDraft::new(
            record.id.clone(),
            record.owner_scope.clone(),
            QueuePayload::Update {
                fields: record.step_data.clone(),
                status: None,
            },
            now,
        )
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_record() {
        let store = setup_store(1 << 20).await;
        let record = record_at(10);
        store.put(&record).await.unwrap();

        let loaded = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);

        let mut updated = loaded;
        updated.status = RecordStatus::InProgress;
        store.put(&updated).await.unwrap();
        assert_eq!(
            store.get(&record.id).await.unwrap().unwrap().status,
            RecordStatus::InProgress
        );
    }

    #[tokio::test]
    async fn list_orders_by_updated_at_and_filters() {
        let store = setup_store(1 << 20).await;
        let older = record_at(10);
        let mut newer = record_at(20);
        newer.status = RecordStatus::Validated;
        let mut clean = record_at(30);
        clean.sync_meta.is_new = false;
        clean.sync_meta.is_dirty = false;
        for record in [&older, &newer, &clean] {
            store.put(record).await.unwrap();
        }

        let all = store.list(&scope(), &RecordFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![clean.id.clone(), newer.id.clone(), older.id.clone()]);

        let validated = store
            .list(&scope(), &RecordFilter::with_status(RecordStatus::Validated))
            .await
            .unwrap();
        assert_eq!(validated.len(), 1);

        let candidates = store
            .list(&scope(), &RecordFilter::sync_candidates(10))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);

        let other = OwnerScope::new("org-2".into()).unwrap();
        assert!(store.list(&other, &RecordFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_record_fails_with_storage_error() {
        let store = setup_store(64).await;
        let mut record = record_at(1);
        record.step_data.get_mut("general").unwrap().insert(
            "notes",
            FieldValue::new(json!("x".repeat(256)), 1),
        );

        let err = store.put(&record).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(store.get(&record.id).await.unwrap().is_none());

        let err = store
            .commit_mutation(&record, vec![update_draft(&record, 1)])
            .await
            .unwrap_err();
        assert!(err.is_storage());
        assert!(store.list_entries(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_failed_backs_off_exponentially() {
        let store = setup_store(1 << 20).await;
        let record = record_at(0);
        let ids = store
            .commit_mutation(&record, vec![update_draft(&record, 0)])
            .await
            .unwrap();
        let failure = QueueFailure::new(FailureKind::Transient, "timeout");

        let first = store.mark_failed(ids[0], &failure, 100).await.unwrap();
        assert_eq!(first.attempts, 1);
        assert_eq!(first.next_attempt_at, 1_100);
        assert!(store.dequeue_ready(500, None).await.unwrap().is_empty());

        let second = store.mark_failed(ids[0], &failure, 1_100).await.unwrap();
        assert_eq!(second.attempts, 2);
        assert_eq!(second.next_attempt_at, 3_100);
        assert_eq!(second.last_error.as_deref(), Some("timeout"));
        assert_eq!(second.last_error_kind, Some(FailureKind::Transient));

        let ready = store.dequeue_ready(3_100, Some(&scope())).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].attempts, 2);
    }

    #[tokio::test]
    async fn pending_count_is_distinct_records_with_work() {
        let store = setup_store(1 << 20).await;
        let a = record_at(1);
        let b = record_at(2);
        let mut clean = record_at(3);
        clean.sync_meta.is_new = false;
        clean.sync_meta.is_dirty = false;
        clean.sync_meta.last_synced_at = Some(3);

        store
            .commit_mutation(&a, vec![update_draft(&a, 1), update_draft(&a, 2)])
            .await
            .unwrap();
        store.put(&b).await.unwrap();
        store.put(&clean).await.unwrap();

        assert_eq!(store.count_pending(&scope()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn commit_sync_recomputes_dirty_from_remaining_entries() {
        let store = setup_store(1 << 20).await;
        let record = record_at(5);
        let ids = store
            .commit_mutation(
                &record,
                vec![update_draft(&record, 5), update_draft(&record, 6)],
            )
            .await
            .unwrap();

        let mut synced = record.clone();
        synced.sync_meta.is_new = false;
        synced.sync_meta.last_synced_at = Some(10);

        let stored = store.commit_sync(synced.clone(), &ids[..1]).await.unwrap();
        assert!(stored.sync_meta.is_dirty);

        let stored = store.commit_sync(synced, &ids[1..]).await.unwrap();
        assert!(!stored.sync_meta.is_dirty);
        assert_eq!(store.count_pending(&scope()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deletion_drops_entries_and_queues_tombstone_atomically() {
        let store = setup_store(1 << 20).await;
        let record = record_at(1);
        store
            .commit_mutation(&record, vec![update_draft(&record, 1)])
            .await
            .unwrap();

        let tombstone =
            QueueEntryDraft::new(record.id.clone(), scope(), QueuePayload::Delete, 2);
        let queued = store
            .commit_deletion(&record.id, Some(tombstone))
            .await
            .unwrap();

        assert!(queued.is_some());
        assert!(store.get(&record.id).await.unwrap().is_none());
        let entries = store.entries_for_record(&record.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, QueuePayload::Delete);
    }
}
