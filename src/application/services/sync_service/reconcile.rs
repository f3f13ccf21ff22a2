use super::Synchronizer;
use crate::application::ports::remote_store::{
    RecordDiff, RecordPayload, RemoteError, RemoteRecord,
};
use crate::domain::entities::step_data::field_count;
use crate::domain::entities::{
    ConflictOverwrite, QueueEntry, QueueEntryDraft, QueueFailure, QueuePayload, Record,
    RecordSyncOutcome, StepData, StepDataMap, SyncMeta,
};
use crate::domain::merge::{MergeOutcome, merge_status, merge_step_data};
use crate::domain::value_objects::{AssetId, FailureKind, OwnerScope, RecordId, SyncQueueId};
use crate::shared::error::AppError;

/// Failure of one unit of work: remote failures are recorded on the queue, local ones abort.
enum StepError {
    Remote(RemoteError),
    Local(AppError),
}

impl From<RemoteError> for StepError {
    fn from(err: RemoteError) -> Self {
        StepError::Remote(err)
    }
}

impl From<AppError> for StepError {
    fn from(err: AppError) -> Self {
        StepError::Local(err)
    }
}

/// Consecutive create/update entries collapse into one reconcile; uploads and deletes
/// are sent one by one. Order is preserved.
enum Segment {
    Fields(Vec<QueueEntry>),
    Upload { entry: QueueEntry, asset_id: AssetId },
    Delete(QueueEntry),
}

fn segments(entries: Vec<QueueEntry>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    for entry in entries {
        match &entry.payload {
            QueuePayload::UploadAsset { asset_id } => {
                let asset_id = asset_id.clone();
                out.push(Segment::Upload { entry, asset_id });
            }
            QueuePayload::Delete => out.push(Segment::Delete(entry)),
            QueuePayload::Create | QueuePayload::Update { .. } => match out.last_mut() {
                Some(Segment::Fields(batch)) => batch.push(entry),
                _ => out.push(Segment::Fields(vec![entry])),
            },
        }
    }
    out
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldSync {
    pushed: usize,
    conflicts: usize,
}

fn entry_ids(entries: &[QueueEntry]) -> Vec<SyncQueueId> {
    entries.iter().map(|entry| entry.id).collect()
}

fn latest_update(steps: &StepDataMap) -> i64 {
    steps
        .values()
        .filter_map(StepData::latest_update)
        .max()
        .unwrap_or(i64::MIN)
}

/// Local copy of a record first seen through a remote pull.
pub(super) fn hydrate(snapshot: RemoteRecord, now: i64) -> Record {
    let synced_through = latest_update(&snapshot.step_data).max(now);
    Record {
        id: snapshot.id,
        owner_scope: snapshot.owner_scope,
        status: snapshot.status,
        step_data: snapshot.step_data,
        pending_assets: Vec::new(),
        assets: snapshot.assets,
        sync_meta: SyncMeta {
            last_synced_at: Some(synced_through),
            is_dirty: false,
            is_new: false,
            needs_attention: false,
            last_error: None,
        },
        created_at: now,
        updated_at: snapshot.updated_at,
    }
}

impl Synchronizer {
    pub(super) async fn sync_record(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        ready: Vec<QueueEntry>,
    ) -> Result<RecordSyncOutcome, AppError> {
        let local = self.local.get(id).await?;
        if local
            .as_ref()
            .is_some_and(|record| record.sync_meta.needs_attention)
        {
            tracing::debug!(target: "sync::engine", record_id = %id, "record awaits user attention, skipping");
            return Ok(RecordSyncOutcome::Deferred);
        }

        if ready.is_empty() {
            let Some(record) = local else {
                return Ok(RecordSyncOutcome::Deferred);
            };
            if !self.local.entries_for_record(id).await?.is_empty() {
                // still inside a backoff window
                return Ok(RecordSyncOutcome::Deferred);
            }
            if !record.sync_meta.is_dirty && !record.sync_meta.is_new {
                return Ok(RecordSyncOutcome::Deferred);
            }
            return match self.reconcile_fields(scope, id, &[]).await {
                Ok(progress) => Ok(RecordSyncOutcome::Synced {
                    pushed_fields: progress.pushed,
                    conflicts: progress.conflicts,
                    assets_uploaded: 0,
                }),
                Err(StepError::Remote(err)) => self.fail(id, &[], err).await,
                Err(StepError::Local(err)) => Err(err),
            };
        }

        let mut progress = FieldSync::default();
        let mut uploaded = 0;
        let mut deleted = false;

        for segment in segments(ready) {
            let (entries, result) = match segment {
                Segment::Fields(entries) => {
                    let result = self
                        .reconcile_fields(scope, id, &entries)
                        .await
                        .map(|done| {
                            progress.pushed += done.pushed;
                            progress.conflicts += done.conflicts;
                        });
                    (entries, result)
                }
                Segment::Upload { entry, asset_id } => {
                    let result = self.upload(scope, id, &entry, &asset_id).await.map(|sent| {
                        if sent {
                            uploaded += 1;
                        }
                    });
                    (vec![entry], result)
                }
                Segment::Delete(entry) => {
                    let result = self.push_delete(scope, id, &entry).await.map(|()| {
                        deleted = true;
                    });
                    (vec![entry], result)
                }
            };

            match result {
                Ok(()) => {}
                Err(StepError::Remote(err)) => return self.fail(id, &entries, err).await,
                Err(StepError::Local(err)) => return Err(err),
            }
        }

        if deleted {
            return Ok(RecordSyncOutcome::Deleted);
        }
        Ok(RecordSyncOutcome::Synced {
            pushed_fields: progress.pushed,
            conflicts: progress.conflicts,
            assets_uploaded: uploaded,
        })
    }

    async fn reconcile_fields(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        entries: &[QueueEntry],
    ) -> Result<FieldSync, StepError> {
        let Some(local) = self.local.get(id).await? else {
            self.confirm(entries).await?;
            return Ok(FieldSync::default());
        };

        // Fetched even for new records: a create whose acknowledgement was lost must not
        // be sent twice.
        let snapshot = self.call(self.remote.get_record(scope, id)).await?;
        match snapshot {
            None if local.sync_meta.is_new => self.push_create(scope, local, entries).await,
            None => Err(StepError::Remote(RemoteError::NotFound(id.to_string()))),
            Some(snapshot) => self.merge_and_push(scope, id, snapshot, entries).await,
        }
    }

    async fn push_create(
        &self,
        scope: &OwnerScope,
        local: Record,
        entries: &[QueueEntry],
    ) -> Result<FieldSync, StepError> {
        let payload = RecordPayload {
            id: local.id,
            owner_scope: local.owner_scope,
            status: local.status,
            step_data: local.step_data,
            created_at: local.created_at,
        };

        let push_started = self.clock.now_millis();
        let remote_id = self.call(self.remote.create_record(scope, &payload)).await?;
        if remote_id != payload.id {
            tracing::warn!(
                target: "sync::engine",
                record_id = %payload.id,
                remote_id = %remote_id,
                "remote answered with a different id; keeping the local one"
            );
        }

        let synced_through = push_started.max(latest_update(&payload.step_data));
        self.finish_push(scope, &payload.id, synced_through, entries, true)
            .await?;

        tracing::info!(target: "sync::engine", record_id = %payload.id, "record created remotely");
        Ok(FieldSync {
            pushed: field_count(&payload.step_data),
            conflicts: 0,
        })
    }

    async fn merge_and_push(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        snapshot: RemoteRecord,
        entries: &[QueueEntry],
    ) -> Result<FieldSync, StepError> {
        // The snapshot was fetched without the lock; merge against the freshest local copy.
        let (diff, merged_through, conflicts) = {
            let _lock = self.locks.acquire(id).await;
            let Some(local) = self.local.get(id).await? else {
                for entry_id in entry_ids(entries) {
                    self.local.mark_succeeded(entry_id).await?;
                }
                return Ok(FieldSync::default());
            };
            let status = (local.status > snapshot.status).then_some(local.status);
            let (record, outcome) = self.merge_into(local, &snapshot);
            self.local.put(&record).await?;
            (
                RecordDiff {
                    status,
                    fields: outcome.outgoing,
                },
                latest_update(&record.step_data),
                outcome.overwritten.len(),
            )
        };

        let push_started = self.clock.now_millis();
        let pushed = field_count(&diff.fields);
        if !diff.is_empty() {
            self.call(self.remote.update_record(scope, id, &diff))
                .await?;
        }
        self.finish_push(scope, id, push_started.max(merged_through), entries, false)
            .await?;

        tracing::debug!(target: "sync::engine", record_id = %id, pushed, conflicts, "record reconciled");
        Ok(FieldSync { pushed, conflicts })
    }

    /// Applies a remote snapshot to a local record; conflicts are logged and counted.
    fn merge_into(&self, mut local: Record, snapshot: &RemoteRecord) -> (Record, MergeOutcome) {
        let mut outcome = merge_step_data(&local.id, &local.step_data, &snapshot.step_data);
        // Only unsynced local edits count as lost; stale copies of synced values do not.
        if let Some(synced_through) = local.sync_meta.last_synced_at {
            outcome
                .overwritten
                .retain(|conflict| conflict.local.updated_at > synced_through);
        }
        self.report_conflicts(&outcome.overwritten);

        local.step_data = std::mem::take(&mut outcome.merged);
        local.status = merge_status(local.status, snapshot.status);
        for asset in &snapshot.assets {
            if !local.assets.iter().any(|known| known.id == asset.id) {
                local.assets.push(asset.clone());
            }
        }
        local.sync_meta.is_new = false;
        if outcome.incoming > 0 {
            local.touch(snapshot.updated_at);
        }
        (local, outcome)
    }

    pub(super) fn adopt_snapshot(&self, local: Record, snapshot: &RemoteRecord) -> Record {
        let (mut record, outcome) = self.merge_into(local, snapshot);
        if !outcome.has_outgoing() && record.status <= snapshot.status {
            let merged_through = latest_update(&record.step_data);
            record.sync_meta.last_synced_at = Some(
                record
                    .sync_meta
                    .last_synced_at
                    .map_or(merged_through, |previous| previous.max(merged_through)),
            );
        }
        record
    }

    fn report_conflicts(&self, conflicts: &[ConflictOverwrite]) {
        for conflict in conflicts {
            tracing::info!(
                target: "sync::conflict",
                record_id = %conflict.record_id,
                step = %conflict.step,
                field = %conflict.field,
                local_updated_at = conflict.local.updated_at,
                remote_updated_at = conflict.remote.updated_at,
                "local edit overwritten by remote value"
            );
        }
        if !conflicts.is_empty() {
            self.metrics.record_conflicts(conflicts.len());
        }
    }

    /// Confirms the pushed entries and stamps `last_synced_at`; `is_dirty` is recomputed
    /// against anything written or queued after the push began.
    async fn finish_push(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        synced_through: i64,
        entries: &[QueueEntry],
        created: bool,
    ) -> Result<(), AppError> {
        let _lock = self.locks.acquire(id).await;
        let confirmed = entry_ids(entries);

        let Some(mut record) = self.local.get(id).await? else {
            for entry_id in confirmed {
                self.local.mark_succeeded(entry_id).await?;
            }
            if created {
                // deleted locally while its create was in flight
                self.local
                    .enqueue(QueueEntryDraft::new(
                        id.clone(),
                        scope.clone(),
                        QueuePayload::Delete,
                        self.clock.now_millis(),
                    ))
                    .await?;
            }
            return Ok(());
        };

        record.sync_meta.is_new = false;
        record.sync_meta.last_error = None;
        record.sync_meta.last_synced_at = Some(
            record
                .sync_meta
                .last_synced_at
                .map_or(synced_through, |previous| previous.max(synced_through)),
        );
        self.local.commit_sync(record, &confirmed).await?;
        Ok(())
    }

    async fn upload(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        entry: &QueueEntry,
        asset_id: &AssetId,
    ) -> Result<bool, StepError> {
        let pending = match self.local.get(id).await? {
            Some(record) => record
                .pending_assets
                .iter()
                .find(|asset| &asset.id == asset_id)
                .cloned(),
            None => {
                self.local.mark_succeeded(entry.id).await?;
                return Ok(false);
            }
        };

        let Some(asset) = pending else {
            // confirmed by an earlier attempt
            self.confirm(std::slice::from_ref(entry)).await?;
            return Ok(false);
        };

        let asset_ref = self
            .call(self.remote.upload_asset(scope, id, &asset))
            .await?;

        let _lock = self.locks.acquire(id).await;
        match self.local.get(id).await? {
            Some(mut record) => {
                record.confirm_asset(asset_ref);
                self.local.commit_sync(record, &[entry.id]).await?;
            }
            None => self.local.mark_succeeded(entry.id).await?,
        }

        tracing::debug!(target: "sync::engine", record_id = %id, asset_id = %asset_id, "asset uploaded");
        Ok(true)
    }

    async fn push_delete(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        entry: &QueueEntry,
    ) -> Result<(), StepError> {
        match self.call(self.remote.delete_record(scope, id)).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(target: "sync::engine", record_id = %id, "remote copy already gone");
            }
            Err(err) => return Err(err.into()),
        }
        self.local.mark_succeeded(entry.id).await?;
        tracing::info!(target: "sync::engine", record_id = %id, "record deleted remotely");
        Ok(())
    }

    /// Drops entries whose work no longer applies, refreshing the record's dirty flag.
    async fn confirm(&self, entries: &[QueueEntry]) -> Result<(), AppError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let _lock = self.locks.acquire(&first.record_id).await;
        let confirmed = entry_ids(entries);
        match self.local.get(&first.record_id).await? {
            Some(record) => {
                self.local.commit_sync(record, &confirmed).await?;
            }
            None => {
                for entry_id in confirmed {
                    self.local.mark_succeeded(entry_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Keeps the entries for retry with backoff; repeated rejections flag the record.
    async fn fail(
        &self,
        id: &RecordId,
        entries: &[QueueEntry],
        err: RemoteError,
    ) -> Result<RecordSyncOutcome, AppError> {
        let now = self.clock.now_millis();
        let kind = err.failure_kind();
        let message = err.to_string();
        let failure = QueueFailure::new(kind, message.clone());

        let mut attempts = 0;
        for entry in entries {
            let updated = self.local.mark_failed(entry.id, &failure, now).await?;
            attempts = attempts.max(updated.attempts);
        }
        let needs_attention = kind == FailureKind::Validation
            && attempts >= self.settings.max_validation_attempts;

        {
            let _lock = self.locks.acquire(id).await;
            if let Some(mut record) = self.local.get(id).await? {
                record.sync_meta.last_error = Some(message.clone());
                record.sync_meta.needs_attention |= needs_attention;
                self.local.put(&record).await?;
            }
        }

        if needs_attention {
            tracing::warn!(
                target: "sync::engine",
                record_id = %id,
                attempts,
                error = %message,
                "remote keeps rejecting record, flagged for attention"
            );
        } else {
            tracing::warn!(
                target: "sync::engine",
                record_id = %id,
                attempts,
                kind = kind.as_str(),
                error = %message,
                "record sync failed, will retry"
            );
        }

        Ok(RecordSyncOutcome::Failed {
            kind,
            message,
            needs_attention,
        })
    }
}
