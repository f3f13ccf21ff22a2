use serde::{Deserialize, Serialize};

use super::step_data::StepDataMap;
use crate::domain::value_objects::{AssetId, OwnerScope, RecordId, RecordStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    pub last_synced_at: Option<i64>,
    pub is_dirty: bool,
    pub is_new: bool,
    #[serde(default)]
    pub needs_attention: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Photo,
    Signature,
    Document,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Photo => "photo",
            AssetKind::Signature => "signature",
            AssetKind::Document => "document",
        }
    }
}

/// Attachment captured on-device and not yet confirmed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAsset {
    pub id: AssetId,
    pub kind: AssetKind,
    pub file_name: String,
    pub mime_type: String,
    pub step: Option<String>,
    pub field: Option<String>,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub added_at: i64,
}

/// Attachment persisted remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: AssetId,
    pub remote_ref: String,
    pub kind: AssetKind,
    pub file_name: String,
    pub mime_type: String,
    pub uploaded_at: i64,
}

/// One diagnostic project's full wizard state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub owner_scope: OwnerScope,
    pub status: RecordStatus,
    pub step_data: StepDataMap,
    pub pending_assets: Vec<PendingAsset>,
    pub assets: Vec<AssetRef>,
    pub sync_meta: SyncMeta,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record {
    /// A record created offline: unknown to the remote and dirty until its create is confirmed.
    pub fn new_local(owner_scope: OwnerScope, now: i64) -> Self {
        Self {
            id: RecordId::generate(),
            owner_scope,
            status: RecordStatus::Draft,
            step_data: StepDataMap::new(),
            pending_assets: Vec::new(),
            assets: Vec::new(),
            sync_meta: SyncMeta {
                last_synced_at: None,
                is_dirty: true,
                is_new: true,
                needs_attention: false,
                last_error: None,
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_pending_asset(&self, id: &AssetId) -> bool {
        self.pending_assets.iter().any(|asset| &asset.id == id)
    }

    pub fn has_asset(&self, id: &AssetId) -> bool {
        self.has_pending_asset(id) || self.assets.iter().any(|asset| &asset.id == id)
    }

    /// Moves a pending attachment into the persisted list once the remote confirmed it.
    pub fn confirm_asset(&mut self, confirmed: AssetRef) -> bool {
        let before = self.pending_assets.len();
        self.pending_assets.retain(|asset| asset.id != confirmed.id);
        let removed = self.pending_assets.len() != before;
        if !self.assets.iter().any(|asset| asset.id == confirmed.id) {
            self.assets.push(confirmed);
        }
        removed
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }

    /// True when a field was written after the last confirmed push, or the remote
    /// has never seen this record.
    pub fn has_unsynced_fields(&self) -> bool {
        if self.sync_meta.is_new {
            return true;
        }
        let since = self.sync_meta.last_synced_at.unwrap_or(i64::MIN);
        self.step_data
            .values()
            .filter_map(|step| step.latest_update())
            .any(|ts| ts > since)
    }

    /// `is_dirty` holds iff work is queued or a field is newer than `last_synced_at`.
    pub fn recompute_dirty(&mut self, has_queued_work: bool) {
        self.sync_meta.is_dirty = has_queued_work || self.has_unsynced_fields();
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(content: &[u8]) -> PendingAsset {
        PendingAsset {
            id: AssetId::from_content(content),
            kind: AssetKind::Photo,
            file_name: "boiler.jpg".into(),
            mime_type: "image/jpeg".into(),
            step: Some("heating".into()),
            field: Some("boiler_photo".into()),
            content: content.to_vec(),
            added_at: 10,
        }
    }

    #[test]
    fn new_local_record_is_new_and_dirty() {
        let record = Record::new_local(OwnerScope::new("org-1".into()).unwrap(), 1_000);
        assert!(record.sync_meta.is_new);
        assert!(record.sync_meta.is_dirty);
        assert_eq!(record.sync_meta.last_synced_at, None);
        assert_eq!(record.status, RecordStatus::Draft);
    }

    #[test]
    fn confirm_asset_moves_pending_into_persisted() {
        let mut record = Record::new_local(OwnerScope::new("org-1".into()).unwrap(), 1_000);
        let asset = pending(b"jpeg-bytes");
        record.pending_assets.push(asset.clone());

        let moved = record.confirm_asset(AssetRef {
            id: asset.id.clone(),
            remote_ref: "remote://assets/1".into(),
            kind: asset.kind,
            file_name: asset.file_name.clone(),
            mime_type: asset.mime_type.clone(),
            uploaded_at: 20,
        });

        assert!(moved);
        assert!(record.pending_assets.is_empty());
        assert_eq!(record.assets.len(), 1);
        assert!(record.has_asset(&asset.id));
    }

    #[test]
    fn dirty_flag_follows_queue_and_field_timestamps() {
        use crate::domain::entities::{FieldValue, StepData};

        let mut record = Record::new_local(OwnerScope::new("org-1".into()).unwrap(), 0);
        record.sync_meta.is_new = false;
        record.sync_meta.last_synced_at = Some(100);
        let mut step = StepData::new();
        step.insert("x", FieldValue::new(serde_json::json!(1), 100));
        record.step_data.insert("s".into(), step);

        record.recompute_dirty(false);
        assert!(!record.sync_meta.is_dirty);

        record.recompute_dirty(true);
        assert!(record.sync_meta.is_dirty);

        record
            .step_data
            .get_mut("s")
            .unwrap()
            .insert("y", FieldValue::new(serde_json::json!(2), 101));
        record.recompute_dirty(false);
        assert!(record.sync_meta.is_dirty);
    }

    #[test]
    fn pending_asset_content_serializes_as_base64() {
        let asset = pending(&[0, 159, 146, 150]);
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["content"], "AJ+Slg==");
        let back: PendingAsset = serde_json::from_value(json).unwrap();
        assert_eq!(back.content, vec![0, 159, 146, 150]);
    }
}
