use super::SqliteLocalStore;
use super::mapper::{EncodedRecord, map_record_row};
use super::queries::{DELETE_RECORD, RECORD_COLUMNS, SELECT_RECORD_BY_ID, UPSERT_RECORD};
use crate::application::ports::record_store::{RecordFilter, RecordStore};
use crate::domain::entities::Record;
use crate::domain::value_objects::{OwnerScope, RecordId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Executor, QueryBuilder, Sqlite};

pub(super) async fn upsert_record<'e, E>(
    executor: E,
    record: &Record,
    encoded: &EncodedRecord,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(UPSERT_RECORD)
        .bind(record.id.as_str())
        .bind(record.owner_scope.as_str())
        .bind(record.status.as_str())
        .bind(&encoded.step_data)
        .bind(&encoded.pending_assets)
        .bind(&encoded.assets)
        .bind(record.sync_meta.last_synced_at)
        .bind(record.sync_meta.is_dirty)
        .bind(record.sync_meta.is_new)
        .bind(record.sync_meta.needs_attention)
        .bind(record.sync_meta.last_error.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteLocalStore {
    async fn get(&self, id: &RecordId) -> Result<Option<Record>, AppError> {
        let row = sqlx::query(SELECT_RECORD_BY_ID)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.as_ref().map(map_record_row).transpose()
    }

    async fn list(
        &self,
        scope: &OwnerScope,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder
            .push(RECORD_COLUMNS)
            .push(" FROM records WHERE owner_scope = ")
            .push_bind(scope.as_str());

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if filter.dirty_only {
            builder.push(" AND is_dirty = 1");
        }
        if filter.sync_candidates {
            builder.push(" AND (is_dirty = 1 OR is_new = 1) AND needs_attention = 0");
        }
        builder.push(" ORDER BY updated_at DESC, id ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;
        rows.iter().map(map_record_row).collect()
    }

    async fn put(&self, record: &Record) -> Result<(), AppError> {
        let encoded = EncodedRecord::encode(record, self.max_record_bytes)?;
        upsert_record(self.pool.get_pool(), record, &encoded).await
    }

    async fn delete(&self, id: &RecordId) -> Result<(), AppError> {
        sqlx::query(DELETE_RECORD)
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
