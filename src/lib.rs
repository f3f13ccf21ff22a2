//! Local-first synchronization engine for offline energy-diagnostic wizards.
//!
//! Wizard answers are stamped per field, persisted to SQLite and queued as pending work
//! on every write. A [`application::services::SyncDriver`] decides when to reconcile, and
//! the [`application::services::Synchronizer`] merges remote snapshots with per-field
//! last-write-wins before draining the queue.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

pub use state::AppState;

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diag_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
