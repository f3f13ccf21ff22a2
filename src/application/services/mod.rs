pub mod record_locks;
pub mod record_service;
pub mod sync_driver;
pub mod sync_service;

pub use record_locks::RecordLocks;
pub use record_service::{NewAsset, RecordService};
pub use sync_driver::{
    DriverSettings, DriverStatus, StoreParticipant, SyncDriver, SyncParticipant,
};
pub use sync_service::{SyncSettings, Synchronizer};
