pub mod memory;

pub use memory::{MemoryRemoteStore, RemoteCallCounts};
