use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::UserId;

/// A private send waiting for the user's confirm/cancel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub source_address: String,
    pub destination_address: String,
    pub amount: Decimal,
}

/// At most one pending transaction per user; a new one replaces the old
#[derive(Default)]
pub struct PendingStore {
    inner: DashMap<UserId, PendingTransaction>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `tx`, returning whatever it replaced
    pub fn replace(&self, user_id: UserId, tx: PendingTransaction) -> Option<PendingTransaction> {
        self.inner.insert(user_id, tx)
    }

    pub fn take(&self, user_id: UserId) -> Option<PendingTransaction> {
        self.inner.remove(&user_id).map(|(_, tx)| tx)
    }

    #[cfg(test)]
    pub fn get(&self, user_id: UserId) -> Option<PendingTransaction> {
        self.inner.get(&user_id).map(|entry| entry.value().clone())
    }
}

type LockMap = DashMap<UserId, Arc<Mutex<()>>>;

/// Keyed async locks serializing all commands of one user. An entry lives
/// only while someone holds or waits for it.
#[derive(Default)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: UserId) -> UserLockGuard {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        UserLockGuard {
            user_id,
            locks: self.locks.clone(),
            _guard: guard,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

pub struct UserLockGuard {
    user_id: UserId,
    locks: Arc<LockMap>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        // Two handles left (the map and this guard) means no one is waiting
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tx(amount: i64) -> PendingTransaction {
        PendingTransaction {
            source_address: "j1source".to_string(),
            destination_address: "j1dest".to_string(),
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn test_replace_keeps_single_entry() {
        let store = PendingStore::new();
        assert!(store.replace(1, tx(1)).is_none());
        assert_eq!(store.replace(1, tx(2)), Some(tx(1)));
        assert_eq!(store.get(1), Some(tx(2)));
        assert_eq!(store.take(1), Some(tx(2)));
        assert!(store.take(1).is_none());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = PendingStore::new();
        store.replace(1, tx(1));
        assert!(store.get(2).is_none());
    }

    #[tokio::test]
    async fn test_same_user_waits_other_user_does_not() {
        let locks = Arc::new(UserLocks::new());
        let held = locks.acquire(1).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(other.is_ok());

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_dropped() {
        let locks = UserLocks::new();
        drop(locks.acquire(1).await);
        assert_eq!(locks.len(), 0);

        let held = locks.acquire(1).await;
        let waiter = async {
            let _guard = locks.acquire(1).await;
            locks.len()
        };
        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(held);
            // The parked waiter still references the entry
            locks.len()
        };

        let (len_inside_waiter, len_after_release) = tokio::join!(waiter, release);
        assert_eq!(len_after_release, 1);
        assert_eq!(len_inside_waiter, 1);
        assert_eq!(locks.len(), 0);
    }
}
