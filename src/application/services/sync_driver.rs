use crate::application::ports::clock::Clock;
use crate::application::ports::connectivity::ConnectivityMonitor;
use crate::application::ports::local_store::LocalStore;
use crate::application::services::sync_service::Synchronizer;
use crate::domain::entities::{SyncPassStatus, SyncReport};
use crate::domain::value_objects::OwnerScope;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What the driver schedules. Implemented by [`Synchronizer`]; tests substitute their own.
#[async_trait]
pub trait SyncParticipant: Send + Sync {
    async fn sync_all(&self, scope: &OwnerScope) -> Result<SyncReport, AppError>;
    fn is_syncing(&self, scope: &OwnerScope) -> bool;
    async fn pending_count(&self, scope: &OwnerScope) -> Result<u64, AppError>;
}

/// Synchronizer bound to the store it reports pending work from.
pub struct StoreParticipant {
    synchronizer: Arc<Synchronizer>,
    local: Arc<dyn LocalStore>,
}

impl StoreParticipant {
    pub fn new(synchronizer: Arc<Synchronizer>, local: Arc<dyn LocalStore>) -> Self {
        Self {
            synchronizer,
            local,
        }
    }
}

#[async_trait]
impl SyncParticipant for StoreParticipant {
    async fn sync_all(&self, scope: &OwnerScope) -> Result<SyncReport, AppError> {
        self.synchronizer.sync_all(scope).await
    }

    fn is_syncing(&self, scope: &OwnerScope) -> bool {
        self.synchronizer.is_syncing(scope)
    }

    async fn pending_count(&self, scope: &OwnerScope) -> Result<u64, AppError> {
        self.local.count_pending(scope).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_at: Option<i64>,
    pub last_report: Option<SyncReport>,
    pub pending_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub interval: Duration,
    pub auto_sync: bool,
}

impl DriverSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            interval: config.interval(),
            auto_sync: config.auto_sync,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Mount,
    Reconnect,
    Interval,
    Manual,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::Mount => "mount",
            Trigger::Reconnect => "reconnect",
            Trigger::Interval => "interval",
            Trigger::Manual => "manual",
        }
    }
}

#[derive(Debug, Default)]
struct DriverState {
    last_sync_at: Option<i64>,
    last_report: Option<SyncReport>,
}

struct DriverInner {
    participant: Arc<dyn SyncParticipant>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    settings: DriverSettings,
    state: RwLock<DriverState>,
}

impl DriverInner {
    async fn run_pass(&self, scope: &OwnerScope, trigger: Trigger) -> Result<SyncReport, AppError> {
        tracing::debug!(target: "sync::driver", scope = %scope, trigger = trigger.as_str(), "sync triggered");
        let report = self.participant.sync_all(scope).await?;
        if report.ran() {
            let mut state = self.state.write().await;
            state.last_sync_at = Some(report.finished_at);
            state.last_report = Some(report.clone());
        }
        Ok(report)
    }

    async fn scheduled_pass(&self, scope: &OwnerScope, trigger: Trigger) {
        if let Err(e) = self.run_pass(scope, trigger).await {
            tracing::error!(target: "sync::driver", scope = %scope, trigger = trigger.as_str(), error = %e, "scheduled sync failed");
        }
    }
}

struct ScheduledTask {
    scope: OwnerScope,
    handle: Option<JoinHandle<()>>,
}

/// Decides when to sync: once on start if online, on every offline to online edge, and
/// on a fixed interval while online. Manual triggers go through [`SyncDriver::sync_now`].
pub struct SyncDriver {
    inner: Arc<DriverInner>,
    task: Mutex<Option<ScheduledTask>>,
}

impl SyncDriver {
    pub fn new(
        participant: Arc<dyn SyncParticipant>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        clock: Arc<dyn Clock>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                participant,
                connectivity,
                clock,
                settings,
                state: RwLock::new(DriverState::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Binds the driver to `scope` and (re)starts its schedule. Must be called from within
    /// a tokio runtime.
    pub fn start(&self, scope: OwnerScope) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = task.take() {
            if let Some(handle) = previous.handle {
                handle.abort();
            }
        }

        let handle = if self.inner.settings.auto_sync {
            let inner = Arc::clone(&self.inner);
            let scope = scope.clone();
            Some(tokio::spawn(async move { schedule(inner, scope).await }))
        } else {
            None
        };

        tracing::info!(
            target: "sync::driver",
            scope = %scope,
            auto_sync = self.inner.settings.auto_sync,
            interval_secs = self.inner.settings.interval.as_secs(),
            "sync driver started"
        );
        *task = Some(ScheduledTask { scope, handle });
    }

    /// Switching scope tears down the running schedule and starts a fresh one.
    pub fn set_scope(&self, scope: OwnerScope) {
        if self.scope().as_ref() == Some(&scope) {
            return;
        }
        self.start(scope);
    }

    pub fn scope(&self) -> Option<OwnerScope> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|task| task.scope.clone())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(|task| task.handle.as_ref())
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Manual trigger. Offline returns an `Offline` report without touching the store.
    pub async fn sync_now(&self) -> Result<SyncReport, AppError> {
        let scope = self.require_scope()?;
        if !self.inner.connectivity.is_online() {
            tracing::debug!(target: "sync::driver", scope = %scope, "manual sync while offline");
            return Ok(SyncReport::skipped(
                SyncPassStatus::Offline,
                self.inner.clock.now_millis(),
            ));
        }
        self.inner.run_pass(&scope, Trigger::Manual).await
    }

    pub async fn status(&self) -> Result<DriverStatus, AppError> {
        let is_online = self.inner.connectivity.is_online();
        let (is_syncing, pending_count) = match self.scope() {
            Some(scope) => (
                self.inner.participant.is_syncing(&scope),
                self.inner.participant.pending_count(&scope).await?,
            ),
            None => (false, 0),
        };
        let state = self.inner.state.read().await;
        Ok(DriverStatus {
            is_online,
            is_syncing,
            last_sync_at: state.last_sync_at,
            last_report: state.last_report.clone(),
            pending_count,
        })
    }

    /// Stops the schedule. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = task.as_mut().and_then(|task| task.handle.take()) {
            handle.abort();
            tracing::info!(target: "sync::driver", "sync driver stopped");
        }
    }

    fn require_scope(&self) -> Result<OwnerScope, AppError> {
        self.scope()
            .ok_or_else(|| AppError::InvalidInput("sync driver has no scope".to_string()))
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn schedule(inner: Arc<DriverInner>, scope: OwnerScope) {
    let mut online_rx = inner.connectivity.subscribe();
    let mut online = *online_rx.borrow_and_update();
    let period = inner.settings.interval;

    if online {
        inner.scheduled_pass(&scope, Trigger::Mount).await;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!(target: "sync::driver", scope = %scope, "connectivity source closed");
                    break;
                }
                let was_online = online;
                online = *online_rx.borrow_and_update();
                if online && !was_online {
                    ticker.reset();
                    inner.scheduled_pass(&scope, Trigger::Reconnect).await;
                }
            }
            _ = ticker.tick(), if online => {
                inner.scheduled_pass(&scope, Trigger::Interval).await;
            }
        }
    }
}
