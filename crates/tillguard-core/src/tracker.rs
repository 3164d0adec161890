//! Per-user failed PIN attempt tracking
//!
//! Each user moves through four states:
//!
//! ```text
//! Clean ──fail──▶ Warned ──fail × max──▶ Locked ──time──▶ Expired-Lock
//!   ▲               │                       │                 │
//!   └──── reset / success / idle window ────┴─────────────────┘
//! ```
//!
//! Lock state is never stored as a flag. It is recomputed from the record's
//! timestamps on every call, so correctness does not depend on the janitor
//! sweep having run. An expired lock keeps its counter until the idle window
//! passes or the user is reset; a further failure locks again immediately.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::lockout::LockoutPolicy;

/// Failure counters for one user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Consecutive failures in the current window
    pub attempts: u32,
    /// Time of the most recent failure
    pub last_attempt: DateTime<Utc>,
    /// End of the current lockout, if one was triggered
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Lockout still in force at `now`
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Idle longer than the reset window
    fn is_stale(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        now - self.last_attempt > policy.reset_delta()
    }

    /// Eligible for eviction by the sweep
    fn is_expired(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        self.locked_until.is_some_and(|until| until <= now) || self.is_stale(now, policy)
    }
}

/// Result of recording a failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStatus {
    pub attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Lock state of a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub is_locked: bool,
    pub attempts: u32,
    /// Time left in the lockout; only set while locked
    pub remaining: Option<Duration>,
    /// Only set while locked
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockStatus {
    /// Remaining lockout in milliseconds
    pub fn remaining_ms(&self) -> Option<u64> {
        self.remaining
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// In-memory failed attempt tracker
///
/// One tracker is shared (behind an `Arc`) by every request handler in the
/// process. It is not shared across processes: each server instance keeps
/// its own counts.
pub struct AttemptTracker {
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<String, AttemptRecord>>,
}

impl AttemptTracker {
    /// Create a tracker on the system clock
    pub fn new(policy: LockoutPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a tracker on a custom clock
    pub fn with_clock(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// The policy this tracker enforces
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Current time as seen by the tracker
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record a failed attempt
    ///
    /// Starts a fresh window if the user has no record or has been idle
    /// past the reset window. Reaching `max_attempts` locks the user; each
    /// further failure pushes `locked_until` out to a full lockout again.
    pub fn record_failure(&self, user_id: &str) -> AttemptStatus {
        let now = self.clock.now();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| AttemptRecord {
                attempts: 0,
                last_attempt: now,
                locked_until: None,
            });

        if record.is_stale(now, &self.policy) {
            debug!("Attempt window expired for {}, starting over", user_id);
            record.attempts = 0;
            record.locked_until = None;
        }

        record.attempts = record.attempts.saturating_add(1);
        record.last_attempt = now;

        if self.policy.should_lock(record.attempts) {
            let until = now
                .checked_add_signed(self.policy.lockout_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.locked_until = Some(until);
            warn!(
                "PIN locked for {}: {} failed attempts, until {}",
                user_id, record.attempts, until
            );
        }

        AttemptStatus {
            attempts: record.attempts,
            is_locked: record.is_locked_at(now),
            locked_until: record.locked_until,
        }
    }

    /// Current lock state of a user. Never mutates.
    pub fn is_locked(&self, user_id: &str) -> LockStatus {
        let now = self.clock.now();
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let Some(record) = records.get(user_id) else {
            return LockStatus::default();
        };

        match record.locked_until {
            Some(until) if until > now => LockStatus {
                is_locked: true,
                attempts: record.attempts,
                remaining: Some((until - now).to_std().unwrap_or_default()),
                locked_until: Some(until),
            },
            _ => LockStatus {
                is_locked: false,
                attempts: record.attempts,
                remaining: None,
                locked_until: None,
            },
        }
    }

    /// Forget a user's failures. Returns whether a record existed.
    pub fn reset(&self, user_id: &str) -> bool {
        let removed = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id)
            .is_some();
        if removed {
            debug!("Reset PIN attempts for {}", user_id);
        }
        removed
    }

    /// Seed a record from durably stored counters
    ///
    /// Only an active stored lockout is restored, and only for users the
    /// tracker has no record of; live in-memory state always wins. The
    /// stored counters carry no last-attempt time, so a bare counter or an
    /// expired lockout cannot be placed in a window and is ignored.
    /// Returns whether a record was inserted.
    pub fn restore(
        &self,
        user_id: &str,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> bool {
        let now = self.clock.now();
        let Some(until) = locked_until.filter(|until| *until > now) else {
            return false;
        };

        let record = AttemptRecord {
            attempts: attempts.max(self.policy.max_attempts),
            last_attempt: until
                .checked_sub_signed(self.policy.lockout_delta())
                .unwrap_or(now),
            locked_until: Some(until),
        };

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(user_id) {
            return false;
        }

        debug!(
            "Restored {} PIN attempts for {} from storage",
            record.attempts, user_id
        );
        records.insert(user_id.to_string(), record);
        true
    }

    /// Copy of a user's record, if any
    pub fn snapshot(&self, user_id: &str) -> Option<AttemptRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict records whose lockout has passed or that sat idle past the
    /// reset window. Returns the number evicted.
    ///
    /// Holds the write lock for the whole pass, so PIN checks wait for one
    /// `retain` over the map. That pass is short for a single store's staff
    /// list; each record is still judged against one `now`, and a record
    /// written just before the pass is never stale.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now, &self.policy));
        before - records.len()
    }
}
