//! Tillguard Core - PIN policy and brute-force lockout
//!
//! This crate holds the policy side of the point-of-sale PIN credential:
//! the complexity rules a new PIN must satisfy, a coarse strength grade for
//! user guidance, a generator for suggested PINs, and the per-user
//! failed-attempt tracker that locks a user out after repeated bad guesses.
//!
//! Nothing here performs I/O. Hashing, persistence and request handling live
//! in `tillguard-service`.

pub mod clock;
pub mod complexity;
pub mod error;
pub mod generator;
pub mod lockout;
pub mod strength;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use complexity::{ComplexityValidator, ComplexityViolation};
pub use error::{PinError, Result};
pub use generator::PinGenerator;
pub use lockout::LockoutPolicy;
pub use strength::{PinStrength, StrengthEvaluator};
pub use tracker::{AttemptRecord, AttemptStatus, AttemptTracker, LockStatus};

/// Number of digits in a PIN
pub const PIN_LENGTH: usize = 4;

/// Consecutive failures before a lockout starts
pub const MAX_ATTEMPTS: u32 = 5;

/// Lockout length in seconds (30 minutes)
pub const LOCKOUT_DURATION_SECS: u64 = 30 * 60;

/// Idle period after which the failure counter starts over (24 hours)
pub const RESET_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Period of the stale-record sweep (1 hour)
pub const JANITOR_INTERVAL_SECS: u64 = 60 * 60;
