#![allow(dead_code)]

use diag_sync::AppState;
use diag_sync::infrastructure::{ManualClock, MemoryRemoteStore};
use diag_sync::shared::AppConfig;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const SCOPE: &str = "org-1";

/// One device: its own database and clock, talking to a shared remote.
pub struct Device {
    pub app: AppState,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sync.retry_base_delay_ms = 1_000;
    config.sync.retry_max_delay_ms = 8_000;
    config
}

pub async fn device(remote: &MemoryRemoteStore, start_ms: i64) -> Device {
    device_with(remote, start_ms, test_config()).await
}

pub async fn device_with(remote: &MemoryRemoteStore, start_ms: i64, config: AppConfig) -> Device {
    let clock = Arc::new(ManualClock::new(start_ms));
    let app = AppState::in_memory(config, Arc::new(remote.clone()), clock.clone())
        .await
        .expect("in-memory engine");
    Device { app, clock }
}

pub fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

/// Polls `check` until it holds or five seconds pass.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
