pub mod clock;
pub mod connectivity;
pub mod database;
pub mod remote;

pub use clock::{ManualClock, SystemClock};
pub use connectivity::WatchConnectivity;
pub use database::{ConnectionPool, SqliteLocalStore};
pub use remote::MemoryRemoteStore;
