pub mod clock;
pub mod connectivity;
pub mod local_store;
pub mod record_store;
pub mod remote_store;
pub mod sync_queue;
