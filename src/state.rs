use crate::application::ports::clock::Clock;
use crate::application::ports::remote_store::RemoteStore;
use crate::application::services::{
    DriverSettings, RecordLocks, RecordService, StoreParticipant, SyncDriver, SyncSettings,
    Synchronizer,
};
use crate::infrastructure::{ConnectionPool, SqliteLocalStore, SystemClock, WatchConnectivity};
use crate::presentation::{RecordHandler, SyncHandler};
use crate::shared::config::AppConfig;
use std::sync::Arc;

/// Everything a host needs, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub store: Arc<SqliteLocalStore>,
    pub connectivity: Arc<WatchConnectivity>,
    pub record_service: Arc<RecordService>,
    pub synchronizer: Arc<Synchronizer>,
    pub driver: Arc<SyncDriver>,
    pub record_handler: Arc<RecordHandler>,
    pub sync_handler: Arc<SyncHandler>,
}

impl AppState {
    /// Opens (and migrates) the configured database and wires the services against
    /// `remote`. Starts offline until the host reports connectivity.
    pub async fn new(config: AppConfig, remote: Arc<dyn RemoteStore>) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        let pool = ConnectionPool::from_config(&config.database).await?;
        Self::assemble(config, pool, remote, Arc::new(SystemClock::new())).await
    }

    /// Same wiring over a private in-memory database.
    pub async fn in_memory(
        config: AppConfig,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let pool = ConnectionPool::from_memory().await?;
        Self::assemble(config, pool, remote, clock).await
    }

    async fn assemble(
        config: AppConfig,
        pool: ConnectionPool,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteLocalStore::from_config(pool.clone(), &config));
        store.initialize().await?;

        let locks = Arc::new(RecordLocks::new());
        let record_service = Arc::new(RecordService::new(
            store.clone(),
            clock.clone(),
            locks.clone(),
        ));
        let synchronizer = Arc::new(Synchronizer::new(
            store.clone(),
            remote,
            clock.clone(),
            locks,
            SyncSettings::from_config(&config),
        ));

        let connectivity = Arc::new(WatchConnectivity::new(false));
        let driver = Arc::new(SyncDriver::new(
            Arc::new(StoreParticipant::new(synchronizer.clone(), store.clone())),
            connectivity.clone(),
            clock,
            DriverSettings::from_config(&config.sync),
        ));

        let record_handler = Arc::new(RecordHandler::new(record_service.clone()));
        let sync_handler = Arc::new(SyncHandler::new(
            driver.clone(),
            synchronizer.clone(),
            record_service.clone(),
        ));

        tracing::info!(
            target: "sync::engine",
            database = %config.database.url,
            auto_sync = config.sync.auto_sync,
            "sync engine ready"
        );

        Ok(Self {
            config,
            pool,
            store,
            connectivity,
            record_service,
            synchronizer,
            driver,
            record_handler,
            sync_handler,
        })
    }

    pub async fn shutdown(&self) {
        self.driver.shutdown();
        self.pool.close().await;
    }
}
