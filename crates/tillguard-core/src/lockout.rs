//! Lockout policy for brute-force protection
//!
//! Three numbers parameterize the policy:
//!
//! - `max_attempts`: consecutive failures before a lockout (default 5)
//! - `lockout_duration`: how long a lockout lasts (default 30 minutes)
//! - `reset_window`: idle time after which the counter starts over (default 24 hours)
//!
//! Every failure recorded while locked extends the lockout by the full
//! duration again (rolling lockout).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LOCKOUT_DURATION_SECS, MAX_ATTEMPTS, RESET_WINDOW_SECS};

/// Failed-attempt lockout policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failures before the user is locked out
    pub max_attempts: u32,
    /// Length of a lockout
    #[serde(with = "duration_secs")]
    pub lockout_duration: Duration,
    /// Inactivity after which the failure counter starts over
    #[serde(with = "duration_secs")]
    pub reset_window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lockout_duration: Duration::from_secs(LOCKOUT_DURATION_SECS),
            reset_window: Duration::from_secs(RESET_WINDOW_SECS),
        }
    }
}

impl LockoutPolicy {
    /// Create a strict policy (fewer attempts, longer lockout)
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration: Duration::from_secs(60 * 60),
            reset_window: Duration::from_secs(48 * 60 * 60),
        }
    }

    /// Create a lenient policy (more attempts allowed)
    pub fn lenient() -> Self {
        Self {
            max_attempts: 10,
            lockout_duration: Duration::from_secs(15 * 60),
            reset_window: Duration::from_secs(12 * 60 * 60),
        }
    }

    /// Whether this many consecutive failures triggers a lockout
    pub fn should_lock(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Failures left before a lockout
    pub fn attempts_remaining(&self, failed_attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(failed_attempts)
    }

    pub(crate) fn lockout_delta(&self) -> chrono::Duration {
        to_chrono(self.lockout_duration)
    }

    pub(crate) fn reset_delta(&self) -> chrono::Duration {
        to_chrono(self.reset_window)
    }

    /// Human-readable lockout state for a user
    pub fn describe(&self, failed_attempts: u32, remaining: Option<Duration>) -> String {
        match remaining {
            Some(remaining) => {
                let secs = remaining.as_secs();
                if secs < 60 {
                    format!("Locked for {} seconds", secs)
                } else if secs < 3600 {
                    format!("Locked for {} minutes", secs.div_ceil(60))
                } else {
                    format!("Locked for {} hours", secs.div_ceil(3600))
                }
            }
            None => format!(
                "{} attempts remaining",
                self.attempts_remaining(failed_attempts)
            ),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Durations as whole seconds in config files
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
