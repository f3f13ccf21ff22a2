pub mod field_value;
pub mod queue_entry;
pub mod record;
pub mod step_data;
pub mod sync_report;

pub use field_value::FieldValue;
pub use queue_entry::{QueueEntry, QueueEntryDraft, QueueFailure, QueuePayload};
pub use record::{AssetKind, AssetRef, PendingAsset, Record, SyncMeta};
pub use step_data::{StepData, StepDataMap};
pub use sync_report::{ConflictOverwrite, RecordSyncOutcome, SyncPassStatus, SyncReport};
