//! Error types for PIN operations
//!
//! Every variant except `Storage` and `Crypto` is an expected outcome of
//! the PIN policy and should be shown to the user. The two infrastructure
//! variants are fatal and belong to the caller's generic error handler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::complexity::ComplexityViolation;

/// Result type alias for PIN operations
pub type Result<T> = std::result::Result<T, PinError>;

/// Errors returned by PIN setup, verification, change and disable
#[derive(Debug, Error)]
pub enum PinError {
    /// Not exactly four digits
    #[error("PIN must be exactly 4 digits")]
    Format,

    /// Rejected by complexity rules
    #[error("PIN rejected: {0}")]
    Policy(ComplexityViolation),

    /// Passed complexity rules but graded weak
    #[error("PIN is too weak")]
    TooWeak,

    /// Wrong PIN at verification time
    #[error("Incorrect PIN ({remaining} attempts remaining)")]
    Mismatch {
        attempts: u32,
        remaining: u32,
        /// Set when this failure started or extended a lockout
        locked_until: Option<DateTime<Utc>>,
    },

    /// Inside a lockout window; the PIN was not compared
    #[error("PIN locked for {} seconds after {attempts} failed attempts", .remaining.as_secs())]
    Locked {
        remaining: Duration,
        attempts: u32,
        locked_until: DateTime<Utc>,
    },

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("PIN is not enabled for user {0}")]
    NotEnabled(String),

    #[error("PIN is already enabled for user {0}")]
    AlreadyEnabled(String),

    /// New PIN equals the current one
    #[error("New PIN must differ from the current PIN")]
    Unchanged,

    /// User store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Hashing failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl PinError {
    /// Infrastructure failures that should not be shown as a policy outcome
    pub fn is_fatal(&self) -> bool {
        matches!(self, PinError::Storage(_) | PinError::Crypto(_))
    }

    /// Whether the failure counts toward a lockout
    pub fn counts_as_attempt(&self) -> bool {
        matches!(self, PinError::Mismatch { .. })
    }
}

impl From<ComplexityViolation> for PinError {
    fn from(violation: ComplexityViolation) -> Self {
        match violation {
            ComplexityViolation::Format => PinError::Format,
            other => PinError::Policy(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_violation_maps_to_format_error() {
        assert!(matches!(
            PinError::from(ComplexityViolation::Format),
            PinError::Format
        ));
        assert!(matches!(
            PinError::from(ComplexityViolation::Sequential),
            PinError::Policy(ComplexityViolation::Sequential)
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PinError::Storage("disk full".into()).is_fatal());
        assert!(PinError::Crypto("bad hash".into()).is_fatal());
        assert!(!PinError::Format.is_fatal());
        assert!(!PinError::Mismatch {
            attempts: 1,
            remaining: 4,
            locked_until: None
        }
        .is_fatal());
    }

    #[test]
    fn test_locked_message() {
        let err = PinError::Locked {
            remaining: Duration::from_secs(90),
            attempts: 5,
            locked_until: Utc::now(),
        };
        assert_eq!(
            err.to_string(),
            "PIN locked for 90 seconds after 5 failed attempts"
        );
    }
}
