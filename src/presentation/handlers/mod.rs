pub mod record_handler;
pub mod sync_handler;

pub use record_handler::RecordHandler;
pub use sync_handler::SyncHandler;
