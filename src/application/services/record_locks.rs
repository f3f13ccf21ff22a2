use crate::domain::value_objects::RecordId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

const PRUNE_THRESHOLD: usize = 256;

/// Per-record async locks shared by every writer of the local store, so a merge pass and
/// a step save never interleave their read-modify-write on the same record.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<RecordId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &RecordId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_record_is_serialized() {
        let locks = Arc::new(RecordLocks::new());
        let id = RecordId::generate();

        let guard = locks.acquire(&id).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();

        let _other = locks.acquire(&RecordId::generate()).await;
        let _again = locks.acquire(&id).await;
    }
}
