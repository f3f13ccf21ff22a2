pub mod dto;
pub mod handlers;

pub use handlers::{RecordHandler, SyncHandler};
