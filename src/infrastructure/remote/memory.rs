use crate::application::ports::remote_store::{
    RecordDiff, RecordPayload, RemoteError, RemoteRecord, RemoteStore,
};
use crate::domain::entities::{AssetRef, PendingAsset};
use crate::domain::value_objects::{AssetId, OwnerScope, RecordId};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCallCounts {
    pub creates: u32,
    pub updates: u32,
    pub gets: u32,
    pub uploads: u32,
    pub deletes: u32,
}

impl RemoteCallCounts {
    pub fn total(&self) -> u32 {
        self.creates + self.updates + self.gets + self.uploads + self.deletes
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    records: HashMap<RecordId, RemoteRecord>,
    assets: HashMap<(RecordId, AssetId), AssetRef>,
    scripted_failures: VecDeque<RemoteError>,
    outage: Option<RemoteError>,
    latency: Option<Duration>,
    calls: RemoteCallCounts,
    creates: Vec<RecordPayload>,
    updates: Vec<(RecordId, RecordDiff)>,
}

impl RemoteState {
    fn take_failure(&mut self) -> Option<RemoteError> {
        self.scripted_failures
            .pop_front()
            .or_else(|| self.outage.clone())
    }
}

/// In-process remote store. Scripted failures are consumed one per call; an outage fails
/// every call until cleared; latency delays every call (use with `tokio::time::pause`).
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<RwLock<RemoteState>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next(&self, error: RemoteError) {
        self.state.write().await.scripted_failures.push_back(error);
    }

    pub async fn set_outage(&self, error: Option<RemoteError>) {
        self.state.write().await.outage = error;
    }

    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Places a record on the remote side as if another device had pushed it.
    pub async fn seed(&self, record: RemoteRecord) {
        self.state
            .write()
            .await
            .records
            .insert(record.id.clone(), record);
    }

    pub async fn record(&self, id: &RecordId) -> Option<RemoteRecord> {
        self.state.read().await.records.get(id).cloned()
    }

    pub async fn calls(&self) -> RemoteCallCounts {
        self.state.read().await.calls
    }

    pub async fn created(&self) -> Vec<RecordPayload> {
        self.state.read().await.creates.clone()
    }

    pub async fn updates(&self) -> Vec<(RecordId, RecordDiff)> {
        self.state.read().await.updates.clone()
    }

    pub async fn asset_count(&self, record_id: &RecordId) -> usize {
        self.state
            .read()
            .await
            .assets
            .keys()
            .filter(|(owner, _)| owner == record_id)
            .count()
    }

    async fn begin_call(&self, count: impl FnOnce(&mut RemoteCallCounts)) -> Result<(), RemoteError> {
        let latency = {
            let mut state = self.state.write().await;
            count(&mut state.calls);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.state.write().await.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn owned_by(record: &RemoteRecord, scope: &OwnerScope) -> bool {
    &record.owner_scope == scope
}

fn latest_field_update(record: &RemoteRecord) -> i64 {
    record
        .step_data
        .values()
        .filter_map(|step| step.latest_update())
        .max()
        .unwrap_or(record.updated_at)
        .max(record.updated_at)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn create_record(
        &self,
        scope: &OwnerScope,
        payload: &RecordPayload,
    ) -> Result<RecordId, RemoteError> {
        self.begin_call(|calls| calls.creates += 1).await?;
        let mut state = self.state.write().await;

        if let Some(existing) = state.records.get(&payload.id) {
            if !owned_by(existing, scope) {
                return Err(RemoteError::Validation(format!(
                    "record {} belongs to another scope",
                    payload.id
                )));
            }
            return Ok(payload.id.clone());
        }

        let mut record = RemoteRecord {
            id: payload.id.clone(),
            owner_scope: scope.clone(),
            status: payload.status,
            step_data: payload.step_data.clone(),
            assets: Vec::new(),
            updated_at: payload.created_at,
        };
        record.updated_at = latest_field_update(&record);
        state.records.insert(payload.id.clone(), record);
        state.creates.push(payload.clone());
        Ok(payload.id.clone())
    }

    async fn update_record(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
        diff: &RecordDiff,
    ) -> Result<(), RemoteError> {
        self.begin_call(|calls| calls.updates += 1).await?;
        let mut state = self.state.write().await;

        let record = state
            .records
            .get_mut(id)
            .filter(|record| owned_by(record, scope))
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;

        for (step, fields) in &diff.fields {
            let target = record.step_data.entry(step.clone()).or_default();
            for (field, value) in fields.iter() {
                target.insert(field.clone(), value.clone());
            }
        }
        if let Some(status) = diff.status {
            record.status = record.status.max(status);
        }
        record.updated_at = latest_field_update(record);

        state.updates.push((id.clone(), diff.clone()));
        Ok(())
    }

    async fn get_record(
        &self,
        scope: &OwnerScope,
        id: &RecordId,
    ) -> Result<Option<RemoteRecord>, RemoteError> {
        self.begin_call(|calls| calls.gets += 1).await?;
        let state = self.state.read().await;
        Ok(state
            .records
            .get(id)
            .filter(|record| owned_by(record, scope))
            .cloned())
    }

    async fn upload_asset(
        &self,
        scope: &OwnerScope,
        record_id: &RecordId,
        asset: &PendingAsset,
    ) -> Result<AssetRef, RemoteError> {
        self.begin_call(|calls| calls.uploads += 1).await?;
        let mut state = self.state.write().await;

        if !state
            .records
            .get(record_id)
            .is_some_and(|record| owned_by(record, scope))
        {
            return Err(RemoteError::NotFound(record_id.to_string()));
        }

        let key = (record_id.clone(), asset.id.clone());
        if let Some(existing) = state.assets.get(&key) {
            return Ok(existing.clone());
        }

        let stored = AssetRef {
            id: asset.id.clone(),
            remote_ref: format!("memory://{}/{}", record_id, asset.id),
            kind: asset.kind,
            file_name: asset.file_name.clone(),
            mime_type: asset.mime_type.clone(),
            uploaded_at: Utc::now().timestamp_millis(),
        };
        state.assets.insert(key, stored.clone());
        if let Some(record) = state.records.get_mut(record_id) {
            record.assets.push(stored.clone());
        }
        Ok(stored)
    }

    async fn delete_record(&self, scope: &OwnerScope, id: &RecordId) -> Result<(), RemoteError> {
        self.begin_call(|calls| calls.deletes += 1).await?;
        let mut state = self.state.write().await;

        let owned = state
            .records
            .get(id)
            .is_some_and(|record| owned_by(record, scope));
        if !owned {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        state.records.remove(id);
        state.assets.retain(|(owner, _), _| owner != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AssetKind, StepDataMap};
    use crate::domain::value_objects::RecordStatus;

    fn scope() -> OwnerScope {
        OwnerScope::new("org".into()).unwrap()
    }

    fn payload(id: &RecordId) -> RecordPayload {
        RecordPayload {
            id: id.clone(),
            owner_scope: scope(),
            status: RecordStatus::Draft,
            step_data: StepDataMap::new(),
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let remote = MemoryRemoteStore::new();
        let id = RecordId::generate();
        remote.fail_next(RemoteError::Timeout(30_000)).await;

        let first = remote.create_record(&scope(), &payload(&id)).await;
        assert_eq!(first, Err(RemoteError::Timeout(30_000)));
        let second = remote.create_record(&scope(), &payload(&id)).await;
        assert_eq!(second, Ok(id.clone()));
        assert_eq!(remote.calls().await.creates, 2);
    }

    #[tokio::test]
    async fn asset_upload_is_idempotent_on_content_id() {
        let remote = MemoryRemoteStore::new();
        let id = RecordId::generate();
        remote.create_record(&scope(), &payload(&id)).await.unwrap();

        let asset = PendingAsset {
            id: AssetId::from_content(b"signature"),
            kind: AssetKind::Signature,
            file_name: "sig.png".into(),
            mime_type: "image/png".into(),
            step: None,
            field: None,
            content: b"signature".to_vec(),
            added_at: 1,
        };
        let a = remote.upload_asset(&scope(), &id, &asset).await.unwrap();
        let b = remote.upload_asset(&scope(), &id, &asset).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(remote.asset_count(&id).await, 1);
    }

    #[tokio::test]
    async fn records_are_invisible_outside_their_scope() {
        let remote = MemoryRemoteStore::new();
        let id = RecordId::generate();
        remote.create_record(&scope(), &payload(&id)).await.unwrap();

        let other = OwnerScope::new("other".into()).unwrap();
        assert_eq!(remote.get_record(&other, &id).await, Ok(None));
        assert!(remote.delete_record(&other, &id).await.unwrap_err().is_not_found());
    }
}
