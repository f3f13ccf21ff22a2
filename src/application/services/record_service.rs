use crate::application::ports::clock::Clock;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::record_store::RecordFilter;
use crate::application::services::record_locks::RecordLocks;
use crate::domain::entities::{
    AssetKind, PendingAsset, QueueEntryDraft, QueuePayload, Record, StepDataMap,
};
use crate::domain::ledger::{self, StepForm};
use crate::domain::value_objects::{AssetId, OwnerScope, RecordId, RecordStatus};
use crate::shared::error::AppError;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewAsset {
    pub kind: AssetKind,
    pub file_name: String,
    pub mime_type: String,
    pub step: Option<String>,
    pub field: Option<String>,
    pub content: Vec<u8>,
}

/// Everything the wizard may do to local data. Each write persists the record and
/// appends its queue entry in one transaction; nothing here talks to the network.
pub struct RecordService {
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<RecordLocks>,
}

impl RecordService {
    pub fn new(local: Arc<dyn LocalStore>, clock: Arc<dyn Clock>, locks: Arc<RecordLocks>) -> Self {
        Self {
            local,
            clock,
            locks,
        }
    }

    pub async fn create_record(&self, scope: &OwnerScope) -> Result<Record, AppError> {
        let now = self.clock.now_millis();
        let record = Record::new_local(scope.clone(), now);
        let draft = QueueEntryDraft::new(
            record.id.clone(),
            scope.clone(),
            QueuePayload::Create,
            now,
        );
        self.local.commit_mutation(&record, vec![draft]).await?;

        tracing::info!(target: "sync::store", record_id = %record.id, scope = %scope, "record created offline");
        Ok(record)
    }

    pub async fn get_record(&self, id: &RecordId) -> Result<Record, AppError> {
        self.local
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("record", id))
    }

    pub async fn list_records(
        &self,
        scope: &OwnerScope,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, AppError> {
        self.local.list(scope, filter).await
    }

    pub async fn list_needing_attention(&self, scope: &OwnerScope) -> Result<Vec<Record>, AppError> {
        let records = self.local.list(scope, &RecordFilter::default()).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.sync_meta.needs_attention)
            .collect())
    }

    pub fn get_step_values(&self, record: &Record, step: &str) -> Map<String, Value> {
        ledger::get_step_values(record, step)
    }

    pub fn get_field_value(&self, record: &Record, step: &str, field: &str) -> Option<Value> {
        ledger::get_field(record, step, field).cloned()
    }

    pub async fn load_step_values(
        &self,
        id: &RecordId,
        step: &str,
    ) -> Result<Map<String, Value>, AppError> {
        let record = self.get_record(id).await?;
        Ok(ledger::get_step_values(&record, step))
    }

    /// Stamps, persists and enqueues one step submit. Every submitted field is re-stamped,
    /// unchanged values included, so the latest submit is the one that wins a merge.
    pub async fn save_step_fields(
        &self,
        id: &RecordId,
        step: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        if step.trim().is_empty() {
            return Err(AppError::InvalidInput("step key cannot be empty".to_string()));
        }
        if fields.is_empty() {
            return Ok(());
        }

        let _lock = self.locks.acquire(id).await;
        let record = self.get_record(id).await?;
        let now = self.clock.now_millis();
        let write = ledger::record_edit(record, step, fields, now);
        if !write.changed() {
            return Ok(());
        }

        let ahead: Vec<&str> = write
            .written
            .iter()
            .filter(|(_, stamped)| stamped.updated_at > now)
            .map(|(field, _)| field.as_str())
            .collect();
        if !ahead.is_empty() {
            tracing::debug!(
                target: "sync::store",
                record_id = %id,
                step,
                fields = ?ahead,
                "stamped past stored values from a clock ahead of ours"
            );
        }

        let mut diff = StepDataMap::new();
        diff.insert(step.to_string(), write.written);
        let draft = QueueEntryDraft::new(
            id.clone(),
            write.record.owner_scope.clone(),
            QueuePayload::Update {
                fields: diff,
                status: None,
            },
            now,
        );
        self.local.commit_mutation(&write.record, vec![draft]).await?;
        Ok(())
    }

    pub async fn save_step<F: StepForm>(&self, id: &RecordId, form: &F) -> Result<(), AppError> {
        let fields = ledger::encode_step(form)?;
        self.save_step_fields(id, F::step().as_str(), fields).await
    }

    pub async fn load_step<F: StepForm>(&self, id: &RecordId) -> Result<F, AppError> {
        let record = self.get_record(id).await?;
        ledger::decode_step(&record)
    }

    /// Stores the bytes under their content hash and queues the upload. Attaching bytes
    /// the record already holds is a no-op returning the existing id.
    pub async fn attach_asset(&self, id: &RecordId, asset: NewAsset) -> Result<AssetId, AppError> {
        if asset.content.is_empty() {
            return Err(AppError::InvalidInput("asset content is empty".to_string()));
        }

        let _lock = self.locks.acquire(id).await;
        let mut record = self.get_record(id).await?;
        let asset_id = AssetId::from_content(&asset.content);
        if record.has_asset(&asset_id) {
            return Ok(asset_id);
        }

        let now = self.clock.now_millis();
        record.pending_assets.push(PendingAsset {
            id: asset_id.clone(),
            kind: asset.kind,
            file_name: asset.file_name,
            mime_type: asset.mime_type,
            step: asset.step,
            field: asset.field,
            content: asset.content,
            added_at: now,
        });
        record.sync_meta.is_dirty = true;
        record.touch(now);

        let draft = QueueEntryDraft::new(
            id.clone(),
            record.owner_scope.clone(),
            QueuePayload::UploadAsset {
                asset_id: asset_id.clone(),
            },
            now,
        );
        self.local.commit_mutation(&record, vec![draft]).await?;

        tracing::debug!(target: "sync::store", record_id = %id, asset_id = %asset_id, "asset attached");
        Ok(asset_id)
    }

    /// Moves the record forward in its workflow; backward moves are rejected.
    pub async fn advance_status(
        &self,
        id: &RecordId,
        next: RecordStatus,
    ) -> Result<Record, AppError> {
        let _lock = self.locks.acquire(id).await;
        let mut record = self.get_record(id).await?;

        if !record.status.can_advance_to(next) {
            return Err(AppError::InvalidInput(format!(
                "cannot move record {id} from {} back to {}",
                record.status.as_str(),
                next.as_str()
            )));
        }
        if record.status == next {
            return Ok(record);
        }

        let now = self.clock.now_millis();
        record.status = next;
        record.sync_meta.is_dirty = true;
        record.touch(now);

        let draft = QueueEntryDraft::new(
            id.clone(),
            record.owner_scope.clone(),
            QueuePayload::Update {
                fields: StepDataMap::new(),
                status: Some(next),
            },
            now,
        );
        self.local.commit_mutation(&record, vec![draft]).await?;
        Ok(record)
    }

    /// Removes the local copy and queues the remote delete atomically. A record the remote
    /// never saw is simply dropped together with its queued work.
    pub async fn delete_record(&self, id: &RecordId) -> Result<(), AppError> {
        let _lock = self.locks.acquire(id).await;
        let record = self.get_record(id).await?;

        let tombstone = if record.sync_meta.is_new {
            None
        } else {
            Some(QueueEntryDraft::new(
                id.clone(),
                record.owner_scope.clone(),
                QueuePayload::Delete,
                self.clock.now_millis(),
            ))
        };
        self.local.commit_deletion(id, tombstone).await?;

        tracing::info!(target: "sync::store", record_id = %id, "record deleted");
        Ok(())
    }

    pub async fn get_pending_sync_count(&self, scope: &OwnerScope) -> Result<u64, AppError> {
        self.local.count_pending(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::record_store::RecordStore;
    use crate::application::ports::sync_queue::SyncQueueStore;
    use crate::domain::entities::{FieldValue, StepData};
    use crate::domain::retry_policy::RetryPolicy;
    use crate::domain::value_objects::{QueueOperation, WizardStep};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::database::{ConnectionPool, SqliteLocalStore};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    async fn setup_service() -> (RecordService, Arc<SqliteLocalStore>, Arc<ManualClock>) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        let store = Arc::new(SqliteLocalStore::new(pool, RetryPolicy::immediate(), 1 << 20));
        store.initialize().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let service = RecordService::new(
            store.clone(),
            clock.clone(),
            Arc::new(RecordLocks::new()),
        );
        (service, store, clock)
    }

    fn scope() -> OwnerScope {
        OwnerScope::new("org-1".into()).unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_record_queues_a_create() {
        let (service, store, _) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();

        assert!(record.sync_meta.is_new);
        let entries = store.entries_for_record(&record.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, QueueOperation::Create);
        assert_eq!(service.get_pending_sync_count(&scope()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_step_fields_persists_and_queues_field_diff() {
        let (service, store, clock) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();

        clock.advance(10);
        service
            .save_step_fields(&record.id, "A", fields(json!({"x": 1, "y": null})))
            .await
            .unwrap();

        let values = service.load_step_values(&record.id, "A").await.unwrap();
        assert_eq!(values["x"], json!(1));
        assert_eq!(values["y"], Value::Null);

        let entries = store.entries_for_record(&record.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        match &entries[1].payload {
            QueuePayload::Update { fields, status } => {
                assert!(status.is_none());
                assert_eq!(fields["A"].len(), 2);
                assert_eq!(fields["A"].get("x").unwrap().updated_at, 1_010);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn resubmitting_a_step_restamps_its_fields() {
        let (service, store, clock) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();
        service
            .save_step_fields(&record.id, "A", fields(json!({"x": 1})))
            .await
            .unwrap();
        clock.advance(5);
        service
            .save_step_fields(&record.id, "A", fields(json!({"x": 1})))
            .await
            .unwrap();

        let stored = service.get_record(&record.id).await.unwrap();
        assert_eq!(stored.step_data["A"].get("x").unwrap().updated_at, 1_005);
        assert_eq!(store.entries_for_record(&record.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn save_lands_over_a_value_stamped_by_a_clock_ahead() {
        let (service, store, clock) = setup_service().await;
        let mut record = service.create_record(&scope()).await.unwrap();
        let mut step = StepData::new();
        step.insert("x", FieldValue::new(json!(7), 9_000));
        record.step_data.insert("A".into(), step);
        store.put(&record).await.unwrap();

        clock.set(4_000);
        service
            .save_step_fields(&record.id, "A", fields(json!({"x": 2})))
            .await
            .unwrap();

        let stored = service.get_record(&record.id).await.unwrap();
        assert_eq!(service.get_field_value(&stored, "A", "x"), Some(json!(2)));
        assert_eq!(stored.step_data["A"].get("x").unwrap().updated_at, 9_001);
        assert!(stored.sync_meta.is_dirty);
    }

    #[tokio::test]
    async fn saving_to_unknown_record_is_not_found() {
        let (service, _, _) = setup_service().await;
        let err = service
            .save_step_fields(&RecordId::generate(), "A", fields(json!({"x": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn attaching_same_bytes_twice_is_a_no_op() {
        let (service, store, _) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();
        let asset = NewAsset {
            kind: AssetKind::Photo,
            file_name: "boiler.jpg".into(),
            mime_type: "image/jpeg".into(),
            step: Some("heating".into()),
            field: Some("boiler_photo".into()),
            content: b"jpeg".to_vec(),
        };

        let first = service.attach_asset(&record.id, asset.clone()).await.unwrap();
        let second = service.attach_asset(&record.id, asset).await.unwrap();

        assert_eq!(first, second);
        let stored = service.get_record(&record.id).await.unwrap();
        assert_eq!(stored.pending_assets.len(), 1);
        let uploads = store
            .entries_for_record(&record.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.operation == QueueOperation::UploadAsset)
            .count();
        assert_eq!(uploads, 1);
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let (service, _, _) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();

        let advanced = service
            .advance_status(&record.id, RecordStatus::Validated)
            .await
            .unwrap();
        assert_eq!(advanced.status, RecordStatus::Validated);

        let err = service
            .advance_status(&record.id, RecordStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deleting_a_never_synced_record_leaves_no_trace() {
        let (service, store, _) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();
        service
            .save_step_fields(&record.id, "A", fields(json!({"x": 1})))
            .await
            .unwrap();

        service.delete_record(&record.id).await.unwrap();

        assert!(store.entries_for_record(&record.id).await.unwrap().is_empty());
        assert_eq!(service.get_pending_sync_count(&scope()).await.unwrap(), 0);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct HeatingForm {
        boiler: String,
        installed_year: Option<u16>,
    }

    impl StepForm for HeatingForm {
        fn step() -> WizardStep {
            WizardStep::Heating
        }
    }

    #[tokio::test]
    async fn typed_forms_are_saved_through_the_ledger() {
        let (service, _, _) = setup_service().await;
        let record = service.create_record(&scope()).await.unwrap();
        let form = HeatingForm {
            boiler: "condensing gas".into(),
            installed_year: Some(2014),
        };

        service.save_step(&record.id, &form).await.unwrap();
        let loaded: HeatingForm = service.load_step(&record.id).await.unwrap();
        assert_eq!(loaded, form);
    }
}
