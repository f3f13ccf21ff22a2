pub mod asset_id;
pub mod failure_kind;
pub mod owner_scope;
pub mod queue_operation;
pub mod record_id;
pub mod record_status;
pub mod sync_queue_id;
pub mod wizard_step;

pub use asset_id::AssetId;
pub use failure_kind::FailureKind;
pub use owner_scope::OwnerScope;
pub use queue_operation::QueueOperation;
pub use record_id::RecordId;
pub use record_status::RecordStatus;
pub use sync_queue_id::SyncQueueId;
pub use wizard_step::WizardStep;
