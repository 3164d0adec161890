//! Per-user serialization of PIN checks
//!
//! The lockout check, the hash comparison and the failure write must happen
//! as one step for a given user, otherwise a burst of concurrent guesses all
//! pass the lockout check before any of them is counted. Requests for
//! different users never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of user id to an async mutex, created on demand
#[derive(Default)]
pub(crate) struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one user's PIN state until dropped
pub(crate) struct UserLockGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    /// Wait for exclusive access to `user_id`
    pub(crate) async fn acquire(&self, user_id: &str) -> UserLockGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;
        UserLockGuard {
            locks: self,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of users with a live lock entry
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map entry is the only remaining reference
        // unless another request is already waiting.
        drop(self.guard.take());

        let mut locks = self
            .locks
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}
