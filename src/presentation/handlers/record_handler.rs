use crate::application::ports::record_store::RecordFilter;
use crate::application::services::{NewAsset, RecordService};
use crate::domain::entities::AssetKind;
use crate::domain::value_objects::{OwnerScope, RecordId, RecordStatus};
use crate::presentation::dto::Validate;
use crate::presentation::dto::record_dto::{
    AdvanceStatusRequest, AttachAssetRequest, CreateRecordRequest, GetStepRequest,
    ListRecordsRequest, RecordResponse, SaveStepRequest, StepValuesResponse,
};
use crate::shared::AppError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

pub struct RecordHandler {
    records: Arc<RecordService>,
}

impl RecordHandler {
    pub fn new(records: Arc<RecordService>) -> Self {
        Self { records }
    }

    pub async fn create_record(
        &self,
        request: CreateRecordRequest,
    ) -> Result<RecordResponse, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let scope = parse_scope(&request.owner_scope)?;
        let record = self.records.create_record(&scope).await?;
        Ok(RecordResponse::from(&record))
    }

    pub async fn get_record(&self, record_id: &str) -> Result<RecordResponse, AppError> {
        let record = self.records.get_record(&parse_record_id(record_id)?).await?;
        Ok(RecordResponse::from(&record))
    }

    pub async fn list_records(
        &self,
        request: ListRecordsRequest,
    ) -> Result<Vec<RecordResponse>, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let scope = parse_scope(&request.owner_scope)?;
        let filter = RecordFilter {
            status: request.status.as_deref().map(parse_status).transpose()?,
            dirty_only: request.dirty_only,
            sync_candidates: false,
            limit: request.limit,
        };
        let records = self.records.list_records(&scope, &filter).await?;
        Ok(records.iter().map(RecordResponse::from).collect())
    }

    pub async fn get_step_values(
        &self,
        request: GetStepRequest,
    ) -> Result<StepValuesResponse, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let id = parse_record_id(&request.record_id)?;
        let values = self.records.load_step_values(&id, &request.step).await?;
        Ok(StepValuesResponse {
            record_id: request.record_id,
            step: request.step,
            values,
        })
    }

    pub async fn save_step(&self, request: SaveStepRequest) -> Result<(), AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let id = parse_record_id(&request.record_id)?;
        self.records
            .save_step_fields(&id, &request.step, request.fields)
            .await
    }

    pub async fn attach_asset(&self, request: AttachAssetRequest) -> Result<String, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let id = parse_record_id(&request.record_id)?;
        let content = STANDARD
            .decode(request.content.as_bytes())
            .map_err(|e| AppError::InvalidInput(format!("Asset content is not base64: {e}")))?;

        let asset_id = self
            .records
            .attach_asset(
                &id,
                NewAsset {
                    kind: parse_asset_kind(&request.kind)?,
                    file_name: request.file_name,
                    mime_type: request.mime_type,
                    step: request.step,
                    field: request.field,
                    content,
                },
            )
            .await?;
        Ok(asset_id.to_string())
    }

    pub async fn advance_status(
        &self,
        request: AdvanceStatusRequest,
    ) -> Result<RecordResponse, AppError> {
        let id = parse_record_id(&request.record_id)?;
        let record = self
            .records
            .advance_status(&id, parse_status(&request.status)?)
            .await?;
        Ok(RecordResponse::from(&record))
    }

    pub async fn delete_record(&self, record_id: &str) -> Result<(), AppError> {
        self.records
            .delete_record(&parse_record_id(record_id)?)
            .await
    }

    pub async fn list_needing_attention(
        &self,
        owner_scope: &str,
    ) -> Result<Vec<RecordResponse>, AppError> {
        let records = self
            .records
            .list_needing_attention(&parse_scope(owner_scope)?)
            .await?;
        Ok(records.iter().map(RecordResponse::from).collect())
    }
}

pub(crate) fn parse_scope(value: &str) -> Result<OwnerScope, AppError> {
    OwnerScope::new(value.to_string()).map_err(AppError::InvalidInput)
}

pub(crate) fn parse_record_id(value: &str) -> Result<RecordId, AppError> {
    RecordId::new(value.to_string()).map_err(AppError::InvalidInput)
}

fn parse_status(value: &str) -> Result<RecordStatus, AppError> {
    RecordStatus::parse(value)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown record status: {value}")))
}

fn parse_asset_kind(value: &str) -> Result<AssetKind, AppError> {
    match value {
        "photo" => Ok(AssetKind::Photo),
        "signature" => Ok(AssetKind::Signature),
        "document" => Ok(AssetKind::Document),
        other => Err(AppError::InvalidInput(format!("Unknown asset kind: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::RecordLocks;
    use crate::domain::retry_policy::RetryPolicy;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::database::{ConnectionPool, SqliteLocalStore};
    use serde_json::json;

    async fn setup_handler() -> RecordHandler {
        let pool = ConnectionPool::from_memory().await.unwrap();
        let store = Arc::new(SqliteLocalStore::new(pool, RetryPolicy::immediate(), 1 << 20));
        store.initialize().await.unwrap();
        let service = RecordService::new(
            store,
            Arc::new(ManualClock::new(1)),
            Arc::new(RecordLocks::new()),
        );
        RecordHandler::new(Arc::new(service))
    }

    #[tokio::test]
    async fn save_and_read_step_through_requests() {
        let handler = setup_handler().await;
        let created = handler
            .create_record(CreateRecordRequest {
                owner_scope: "org-1".into(),
            })
            .await
            .unwrap();

        handler
            .save_step(SaveStepRequest {
                record_id: created.id.clone(),
                step: "general".into(),
                fields: json!({"surface": 0, "heated": false})
                    .as_object()
                    .cloned()
                    .unwrap(),
            })
            .await
            .unwrap();

        let step = handler
            .get_step_values(GetStepRequest {
                record_id: created.id,
                step: "general".into(),
            })
            .await
            .unwrap();
        assert_eq!(step.values["surface"], json!(0));
        assert_eq!(step.values["heated"], json!(false));
    }

    #[tokio::test]
    async fn malformed_requests_are_invalid_input() {
        let handler = setup_handler().await;
        let err = handler
            .create_record(CreateRecordRequest {
                owner_scope: "".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = handler
            .attach_asset(AttachAssetRequest {
                record_id: "p-1".into(),
                kind: "photo".into(),
                file_name: "a.jpg".into(),
                mime_type: "image/jpeg".into(),
                step: None,
                field: None,
                content: "not base64!".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
