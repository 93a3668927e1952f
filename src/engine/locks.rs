use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per room. Every read-decide-write on a room runs while holding its guard.
#[derive(Debug, Clone, Default)]
pub struct RoomLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, room_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.inner.entry(room_id).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Drop the lock of a deleted room. Waiters already queued on it still get it.
    pub fn forget(&self, room_id: Uuid) {
        self.inner.remove(&room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_room_is_serialized() {
        let locks = RoomLocks::new();
        let room = Uuid::new_v4();

        let guard = locks.acquire(room).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), locks.acquire(room)).await;
        assert!(waiting.is_err());

        drop(guard);
        let retry = tokio::time::timeout(Duration::from_millis(50), locks.acquire(room)).await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn test_rooms_do_not_share_a_lock() {
        let locks = RoomLocks::new();
        let _first = locks.acquire(Uuid::new_v4()).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4())).await;
        assert!(other.is_ok());
    }
}
