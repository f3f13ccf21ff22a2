use tokio::sync::watch;

/// Network reachability as seen by the host platform.
pub trait ConnectivityMonitor: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every online/offline transition; dropping it unsubscribes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
