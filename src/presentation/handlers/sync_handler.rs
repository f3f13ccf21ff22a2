use super::record_handler::{parse_record_id, parse_scope};
use crate::application::services::{RecordService, SyncDriver, Synchronizer};
use crate::presentation::dto::record_dto::RecordResponse;
use crate::presentation::dto::sync_dto::{
    PendingCountResponse, PullRecordRequest, SyncReportResponse, SyncStatusResponse,
};
use crate::shared::AppError;
use std::sync::Arc;

pub struct SyncHandler {
    driver: Arc<SyncDriver>,
    synchronizer: Arc<Synchronizer>,
    records: Arc<RecordService>,
}

impl SyncHandler {
    pub fn new(
        driver: Arc<SyncDriver>,
        synchronizer: Arc<Synchronizer>,
        records: Arc<RecordService>,
    ) -> Self {
        Self {
            driver,
            synchronizer,
            records,
        }
    }

    /// Binds the background schedule to the signed-in organisation.
    pub fn start(&self, owner_scope: &str) -> Result<(), AppError> {
        self.driver.start(parse_scope(owner_scope)?);
        Ok(())
    }

    pub async fn sync_now(&self) -> Result<SyncReportResponse, AppError> {
        let report = self.driver.sync_now().await?;
        Ok(SyncReportResponse::from(&report))
    }

    /// Direct pass for one scope, bypassing the driver's connectivity check.
    pub async fn sync_scope(&self, owner_scope: &str) -> Result<SyncReportResponse, AppError> {
        let report = self
            .synchronizer
            .sync_all(&parse_scope(owner_scope)?)
            .await?;
        Ok(SyncReportResponse::from(&report))
    }

    pub async fn get_status(&self) -> Result<SyncStatusResponse, AppError> {
        let status = self.driver.status().await?;
        Ok(SyncStatusResponse::new(status, self.synchronizer.metrics()))
    }

    pub async fn get_pending_count(
        &self,
        owner_scope: &str,
    ) -> Result<PendingCountResponse, AppError> {
        let scope = parse_scope(owner_scope)?;
        let pending_count = self.records.get_pending_sync_count(&scope).await?;
        Ok(PendingCountResponse {
            owner_scope: scope.to_string(),
            pending_count,
        })
    }

    pub async fn pull_record(&self, request: PullRecordRequest) -> Result<RecordResponse, AppError> {
        let scope = parse_scope(&request.owner_scope)?;
        let id = parse_record_id(&request.record_id)?;
        let record = self.synchronizer.pull_record(&scope, &id).await?;
        Ok(RecordResponse::from(&record))
    }

    pub fn stop(&self) {
        self.driver.shutdown();
    }
}
