use crate::domain::entities::Record;
use crate::presentation::dto::Validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MAX_ASSET_BASE64_LEN: usize = 12 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub owner_scope: String,
}

impl Validate for CreateRecordRequest {
    fn validate(&self) -> Result<(), String> {
        if self.owner_scope.trim().is_empty() {
            return Err("Owner scope is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordsRequest {
    pub owner_scope: String,
    pub status: Option<String>,
    #[serde(default)]
    pub dirty_only: bool,
    pub limit: Option<u32>,
}

impl Validate for ListRecordsRequest {
    fn validate(&self) -> Result<(), String> {
        if self.owner_scope.trim().is_empty() {
            return Err("Owner scope is required".to_string());
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > 1000 {
                return Err("Limit must be between 1 and 1000".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStepRequest {
    pub record_id: String,
    pub step: String,
    pub fields: Map<String, Value>,
}

impl Validate for SaveStepRequest {
    fn validate(&self) -> Result<(), String> {
        if self.record_id.is_empty() {
            return Err("Record ID is required".to_string());
        }
        if self.step.trim().is_empty() {
            return Err("Step is required".to_string());
        }
        if self.fields.keys().any(|key| key.is_empty()) {
            return Err("Field names cannot be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStepRequest {
    pub record_id: String,
    pub step: String,
}

impl Validate for GetStepRequest {
    fn validate(&self) -> Result<(), String> {
        if self.record_id.is_empty() {
            return Err("Record ID is required".to_string());
        }
        if self.step.trim().is_empty() {
            return Err("Step is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValuesResponse {
    pub record_id: String,
    pub step: String,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachAssetRequest {
    pub record_id: String,
    pub kind: String,
    pub file_name: String,
    pub mime_type: String,
    pub step: Option<String>,
    pub field: Option<String>,
    /// Standard base64 of the file bytes.
    pub content: String,
}

impl Validate for AttachAssetRequest {
    fn validate(&self) -> Result<(), String> {
        if self.record_id.is_empty() {
            return Err("Record ID is required".to_string());
        }
        if self.file_name.trim().is_empty() {
            return Err("File name is required".to_string());
        }
        if self.content.is_empty() {
            return Err("Asset content is required".to_string());
        }
        if self.content.len() > MAX_ASSET_BASE64_LEN {
            return Err("Asset is too large (max 9MB)".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStatusRequest {
    pub record_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub id: String,
    pub kind: String,
    pub file_name: String,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub owner_scope: String,
    pub status: String,
    pub is_dirty: bool,
    pub is_new: bool,
    pub needs_attention: bool,
    pub last_synced_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub steps: Vec<String>,
    pub assets: Vec<AssetSummary>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Record> for RecordResponse {
    fn from(record: &Record) -> Self {
        let pending = record.pending_assets.iter().map(|asset| AssetSummary {
            id: asset.id.to_string(),
            kind: asset.kind.as_str().to_string(),
            file_name: asset.file_name.clone(),
            uploaded: false,
        });
        let uploaded = record.assets.iter().map(|asset| AssetSummary {
            id: asset.id.to_string(),
            kind: asset.kind.as_str().to_string(),
            file_name: asset.file_name.clone(),
            uploaded: true,
        });

        Self {
            id: record.id.to_string(),
            owner_scope: record.owner_scope.to_string(),
            status: record.status.as_str().to_string(),
            is_dirty: record.sync_meta.is_dirty,
            is_new: record.sync_meta.is_new,
            needs_attention: record.sync_meta.needs_attention,
            last_synced_at: record.sync_meta.last_synced_at,
            last_error: record.sync_meta.last_error.clone(),
            steps: record.step_data.keys().cloned().collect(),
            assets: uploaded.chain(pending).collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
