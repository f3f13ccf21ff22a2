use super::ConnectionPool;
use crate::domain::retry_policy::RetryPolicy;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;

mod local;
mod mapper;
mod queries;
mod records;
mod sync_queue;

/// SQLite-backed record store and pending work queue sharing one pool, so that record
/// writes and queue appends can commit in a single transaction.
pub struct SqliteLocalStore {
    pool: ConnectionPool,
    retry_policy: RetryPolicy,
    max_record_bytes: usize,
}

impl SqliteLocalStore {
    pub fn new(pool: ConnectionPool, retry_policy: RetryPolicy, max_record_bytes: usize) -> Self {
        Self {
            pool,
            retry_policy,
            max_record_bytes,
        }
    }

    pub fn from_config(pool: ConnectionPool, config: &AppConfig) -> Self {
        Self::new(
            pool,
            config.sync.retry_policy(),
            config.storage.max_record_bytes,
        )
    }

    pub async fn initialize(&self) -> Result<(), AppError> {
        self.pool.migrate().await?;
        Ok(())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}
