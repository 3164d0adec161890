//! Coarse PIN strength grading
//!
//! Strength is user guidance, not an entropy estimate. A four-digit PIN
//! tops out around 13 bits, so the grader only names the patterns it knows
//! are weak and calls everything else strong.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityValidator;

/// Strength grade of a PIN
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinStrength {
    /// Fails complexity validation
    Weak,
    /// Acceptable but memorable (`ABAB`)
    Medium,
    /// No known weak pattern
    Strong,
}

impl PinStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinStrength::Weak => "WEAK",
            PinStrength::Medium => "MEDIUM",
            PinStrength::Strong => "STRONG",
        }
    }
}

impl fmt::Display for PinStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength grader
pub struct StrengthEvaluator;

impl StrengthEvaluator {
    /// Grade a PIN
    ///
    /// `Weak` exactly when [`ComplexityValidator::validate`] rejects the PIN,
    /// so the two never disagree about what is minimally acceptable.
    pub fn evaluate(pin: &str) -> PinStrength {
        if ComplexityValidator::validate(pin).is_err() {
            return PinStrength::Weak;
        }

        if Self::is_alternating_pair(pin) {
            return PinStrength::Medium;
        }

        PinStrength::Strong
    }

    /// `ABAB` with two distinct digits
    fn is_alternating_pair(pin: &str) -> bool {
        match pin.as_bytes() {
            [a, b, c, d] => a == c && b == d && a != b,
            _ => false,
        }
    }
}
