use crate::domain::entities::Record;
use crate::domain::value_objects::{OwnerScope, RecordId, RecordStatus};
use crate::shared::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<RecordStatus>,
    pub dirty_only: bool,
    /// Dirty or never-created records that are not waiting on the user.
    pub sync_candidates: bool,
    pub limit: Option<u32>,
}

impl RecordFilter {
    pub fn sync_candidates(limit: u32) -> Self {
        Self {
            sync_candidates: true,
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_status(status: RecordStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &RecordId) -> Result<Option<Record>, AppError>;

    /// Records of one scope, most recently updated first.
    async fn list(&self, scope: &OwnerScope, filter: &RecordFilter)
    -> Result<Vec<Record>, AppError>;

    /// Upsert by id. Fails with [`AppError::Storage`] when the row cannot be serialized
    /// or exceeds the configured capacity.
    async fn put(&self, record: &Record) -> Result<(), AppError>;

    async fn delete(&self, id: &RecordId) -> Result<(), AppError>;
}
