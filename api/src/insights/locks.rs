use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// Per-user mutual exclusion for insight generation.
///
/// Entries live only while a run holds or waits for them, so the map is
/// bounded by the number of users with an in-flight run. A waiter that is
/// cancelled (client disconnect) prunes the entry on its way out too.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Reference to a map entry held by a waiter or holder. The last one dropped
/// removes the entry.
struct LockEntry {
    user_id: Uuid,
    lock: Option<Arc<AsyncMutex<()>>>,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        drop(self.lock.take());
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map itself still references the mutex: nobody holds or waits.
        if map
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.user_id);
        }
    }
}

pub struct UserLockGuard {
    // Field order matters: the mutex is released before the entry is pruned.
    _guard: OwnedMutexGuard<()>,
    _entry: LockEntry,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: Uuid) -> UserLockGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(user_id).or_default().clone()
        };
        let entry = LockEntry {
            user_id,
            lock: Some(lock.clone()),
            locks: self.inner.clone(),
        };
        let guard = lock.lock_owned().await;
        UserLockGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_user_is_serialized() {
        let locks = UserLocks::default();
        let user = Uuid::now_v7();

        let first = locks.acquire(user).await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(user)).await;
        assert!(blocked.is_err(), "second acquire must wait for the first");

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(500), locks.acquire(user)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::default();
        let _a = locks.acquire(Uuid::now_v7()).await;
        let b = tokio::time::timeout(Duration::from_millis(500), locks.acquire(Uuid::now_v7())).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn entries_are_removed_when_released() {
        let locks = UserLocks::default();
        let user = Uuid::now_v7();
        {
            let _guard = locks.acquire(user).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_removes_the_entry() {
        let locks = UserLocks::default();
        let user = Uuid::now_v7();
        let holder = locks.acquire(user).await;

        let waiting = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = waiting.acquire(user).await;
            std::future::pending::<()>().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Release while the waiter is queued, then cancel it before it runs.
        drop(holder);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        assert_eq!(locks.active(), 0);
    }
}
