use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::retry_policy::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval: u64,
    pub max_validation_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub batch_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub max_record_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/diag_sync.db".to_string(),
                max_connections: 5,
                connection_timeout: 30,
            },
            sync: SyncConfig::default(),
            remote: RemoteConfig {
                request_timeout: 30,
            },
            storage: StorageConfig {
                max_record_bytes: 8 * 1024 * 1024, // 8MiB
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval: 300, // 5 minutes
            max_validation_attempts: 3,
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 300_000,
            batch_size: 100,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base_delay_ms, self.retry_max_delay_ms)
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DIAGSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        } else if let Some(url) = default_database_url() {
            cfg.database.url = url;
        }
        if let Some(value) = env_u64("DIAGSYNC_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.clamp(1, u64::from(u32::MAX)) as u32;
        }

        if let Ok(v) = std::env::var("DIAGSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("DIAGSYNC_SYNC_INTERVAL_SECS") {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Some(value) = env_u64("DIAGSYNC_MAX_VALIDATION_ATTEMPTS") {
            cfg.sync.max_validation_attempts = value.clamp(1, u64::from(u32::MAX)) as u32;
        }
        if let Some(value) = env_u64("DIAGSYNC_RETRY_BASE_DELAY_MS") {
            cfg.sync.retry_base_delay_ms = value;
        }
        if let Some(value) = env_u64("DIAGSYNC_RETRY_MAX_DELAY_MS") {
            cfg.sync.retry_max_delay_ms = value;
        }
        if let Some(value) = env_u64("DIAGSYNC_REMOTE_TIMEOUT_SECS") {
            cfg.remote.request_timeout = value.max(1);
        }
        if let Some(value) = env_u64("DIAGSYNC_MAX_RECORD_BYTES") {
            cfg.storage.max_record_bytes = value as usize;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.sync_interval == 0 {
            return Err("Sync interval must be greater than 0".to_string());
        }
        if self.sync.max_validation_attempts == 0 {
            return Err("Sync max_validation_attempts must be greater than 0".to_string());
        }
        if self.sync.retry_base_delay_ms > self.sync.retry_max_delay_ms {
            return Err("Retry base delay must not exceed the max delay".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.remote.request_timeout == 0 {
            return Err("Remote request_timeout must be greater than 0".to_string());
        }
        if self.storage.max_record_bytes == 0 {
            return Err("Storage max_record_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_database_url() -> Option<String> {
    let dir = dirs::data_local_dir()?.join("diag-sync");
    Some(format!("sqlite://{}?mode=rwc", dir.join("diag_sync.db").display()))
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sync.interval(), Duration::from_secs(300));
        assert_eq!(cfg.remote.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn validate_rejects_inverted_retry_window() {
        let mut cfg = AppConfig::default();
        cfg.sync.retry_base_delay_ms = 10_000;
        cfg.sync.retry_max_delay_ms = 1_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_falls_back_on_garbage() {
        assert!(parse_bool("on", false));
        assert!(!parse_bool("OFF", true));
        assert!(parse_bool("maybe", true));
    }
}
