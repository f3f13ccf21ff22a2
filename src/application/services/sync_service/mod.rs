//! Synchronizer: reconciles dirty records against the remote store and drains the pending
//! work queue, one independent unit of work per record.

mod guard;
mod metrics;
mod reconcile;

pub use guard::{ScopeGuards, ScopeToken};
pub use metrics::{PassOutcomeStatus, SyncMetrics, SyncMetricsSnapshot};

use crate::application::ports::clock::Clock;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::record_store::RecordFilter;
use crate::application::ports::remote_store::{RemoteError, RemoteStore};
use crate::application::services::record_locks::RecordLocks;
use crate::domain::entities::{QueueEntry, Record, SyncPassStatus, SyncReport};
use crate::domain::value_objects::{OwnerScope, RecordId};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub request_timeout: Duration,
    pub max_validation_attempts: u32,
    pub batch_size: u32,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.remote.timeout(),
            max_validation_attempts: config.sync.max_validation_attempts,
            batch_size: config.sync.batch_size,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct Synchronizer {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<RecordLocks>,
    guards: Arc<ScopeGuards>,
    metrics: Arc<SyncMetrics>,
    settings: SyncSettings,
}

impl Synchronizer {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        locks: Arc<RecordLocks>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            local,
            remote,
            clock,
            locks,
            guards: Arc::new(ScopeGuards::new()),
            metrics: Arc::new(SyncMetrics::new()),
            settings,
        }
    }

    /// One pass over every dirty, new or queued record of `scope`.
    ///
    /// A call made while a pass for the same scope is in flight returns an
    /// [`SyncPassStatus::AlreadyRunning`] report immediately and performs no I/O. Remote
    /// failures are contained per record; a local storage failure aborts the pass.
    pub async fn sync_all(&self, scope: &OwnerScope) -> Result<SyncReport, AppError> {
        let Some(_token) = self.guards.try_acquire(scope) else {
            tracing::debug!(target: "sync::engine", scope = %scope, "sync already in flight, dropping request");
            self.metrics.record_skipped();
            return Ok(SyncReport::skipped(
                SyncPassStatus::AlreadyRunning,
                self.clock.now_millis(),
            ));
        };

        let started_at = self.clock.now_millis();
        match self.run_pass(scope, started_at).await {
            Ok(report) => {
                self.metrics.record_pass(&report);
                tracing::info!(
                    target: "sync::engine",
                    scope = %scope,
                    succeeded = report.succeeded,
                    errors = report.errors,
                    deferred = report.deferred,
                    conflicts = report.conflicts,
                    duration_ms = report.finished_at - report.started_at,
                    "sync pass finished"
                );
                Ok(report)
            }
            Err(err) => {
                self.metrics.record_aborted(started_at, &err.to_string());
                tracing::error!(target: "sync::engine", scope = %scope, error = %err, "sync pass aborted");
                Err(err)
            }
        }
    }

    async fn run_pass(&self, scope: &OwnerScope, started_at: i64) -> Result<SyncReport, AppError> {
        let mut report = SyncReport::started(started_at);
        let (plan, mut ready) = self.plan_pass(scope, started_at).await?;

        for record_id in plan {
            let entries = ready.remove(&record_id).unwrap_or_default();
            let outcome = self.sync_record(scope, &record_id, entries).await?;
            report.record(&record_id, &outcome);
        }

        report.finished_at = self.clock.now_millis();
        Ok(report)
    }

    /// Records to visit in queue order first, then dirty records with nothing queued.
    async fn plan_pass(
        &self,
        scope: &OwnerScope,
        now: i64,
    ) -> Result<(Vec<RecordId>, HashMap<RecordId, Vec<QueueEntry>>), AppError> {
        let batch = self.settings.batch_size.max(1) as usize;
        let mut plan: Vec<RecordId> = Vec::new();
        let mut ready: HashMap<RecordId, Vec<QueueEntry>> = HashMap::new();

        for entry in self.local.dequeue_ready(now, Some(scope)).await? {
            if !ready.contains_key(&entry.record_id) {
                if plan.len() >= batch {
                    continue;
                }
                plan.push(entry.record_id.clone());
            }
            ready.entry(entry.record_id.clone()).or_default().push(entry);
        }

        let candidates = self
            .local
            .list(scope, &RecordFilter::sync_candidates(self.settings.batch_size))
            .await?;
        for record in candidates {
            if plan.len() >= batch {
                break;
            }
            if !plan.contains(&record.id) {
                plan.push(record.id);
            }
        }

        Ok((plan, ready))
    }

    /// Fetches a remote record and merges it into the local copy, creating the local copy
    /// when the device has never seen it.
    pub async fn pull_record(&self, scope: &OwnerScope, id: &RecordId) -> Result<Record, AppError> {
        let snapshot = self
            .call(self.remote.get_record(scope, id))
            .await?
            .ok_or_else(|| AppError::not_found("remote record", id))?;

        let _lock = self.locks.acquire(id).await;
        let now = self.clock.now_millis();
        let record = match self.local.get(id).await? {
            Some(local) => {
                if &local.owner_scope != scope {
                    return Err(AppError::InvalidInput(format!(
                        "record {id} belongs to scope {}",
                        local.owner_scope
                    )));
                }
                self.adopt_snapshot(local, &snapshot)
            }
            None => reconcile::hydrate(snapshot, now),
        };

        let stored = self.local.commit_sync(record, &[]).await?;
        tracing::info!(target: "sync::engine", record_id = %id, dirty = stored.sync_meta.is_dirty, "record pulled");
        Ok(stored)
    }

    pub fn is_syncing(&self, scope: &OwnerScope) -> bool {
        self.guards.is_active(scope)
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Bounds a remote call by the request timeout; expiry is a transient failure.
    async fn call<T, F>(&self, request: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.settings.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(
                u64::try_from(self.settings.request_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}
