use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-user serialization locks.
///
/// The outer mutex only guards lookup/creation of a user's lock; waiting for
/// and holding a user's lock never blocks other users. The per-user lock is
/// fair, so waiters of one user are served in arrival order. A user's entry
/// is dropped once nobody holds or waits for it.
#[derive(Default)]
pub struct UserLocks {
    locks: LockMap,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive processing of `user`'s messages; released on drop.
    pub async fn acquire(&self, user: &str) -> UserGuard {
        let lock = self
            .locks
            .lock()
            .entry(user.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        UserGuard {
            guard: Some(guard),
            user: user.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// Number of users currently holding or waiting for their lock
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one user's lock.
pub struct UserGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user: String,
    locks: LockMap,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone.
        drop(self.guard.take());

        let mut locks = self.locks.lock();
        // Waiters clone the entry under this map lock, so a count of one means
        // nobody else can reach it.
        if locks
            .get(&self.user)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user);
        }
    }
}
