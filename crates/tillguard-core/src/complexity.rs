//! PIN complexity validation
//!
//! Applied whenever a PIN is first set or changed. A PIN must be exactly
//! four ASCII digits and must not be one of the patterns tried first in a
//! guessing attack:
//!
//! - common PINs (single digit, straight runs, adjacent-digit pairs, years)
//! - a straight ascending or descending run anywhere in the PIN
//! - one digit repeated four times in a row
//!
//! The checks run in that order and the first one that fails is reported.

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::PIN_LENGTH;

/// The 14 straight runs of four digits, ascending then descending
pub const SEQUENTIAL_RUNS: [&str; 14] = [
    "0123", "1234", "2345", "3456", "4567", "5678", "6789", //
    "9876", "8765", "7654", "6543", "5432", "4321", "3210",
];

/// First calendar year on the deny-list
pub const FIRST_DENIED_YEAR: u16 = 1900;
/// Last calendar year on the deny-list
pub const LAST_DENIED_YEAR: u16 = 2025;

/// Reason a PIN was rejected by [`ComplexityValidator`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum ComplexityViolation {
    #[error("PIN must be exactly 4 digits")]
    Format,

    #[error("PIN is too common")]
    Common,

    #[error("PIN must not contain a sequence of consecutive digits")]
    Sequential,

    #[error("PIN must not repeat the same digit")]
    RepeatedDigits,
}

/// Complexity rules for new PINs
pub struct ComplexityValidator;

impl ComplexityValidator {
    /// Validate a candidate PIN
    pub fn validate(pin: &str) -> Result<(), ComplexityViolation> {
        if !Self::is_well_formed(pin) {
            return Err(ComplexityViolation::Format);
        }

        if Self::is_common(pin) {
            return Err(ComplexityViolation::Common);
        }

        if Self::contains_sequential_run(pin) {
            return Err(ComplexityViolation::Sequential);
        }

        if Self::has_repeated_digit(pin) {
            return Err(ComplexityViolation::RepeatedDigits);
        }

        Ok(())
    }

    /// Exactly four ASCII digits. A leading zero is allowed.
    pub fn is_well_formed(pin: &str) -> bool {
        pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
    }

    /// Membership in the fixed deny-list
    pub fn is_common(pin: &str) -> bool {
        common_pins().contains(pin)
    }

    /// Whether any of the 14 straight runs appears in the PIN
    pub fn contains_sequential_run(pin: &str) -> bool {
        SEQUENTIAL_RUNS.iter().any(|run| pin.contains(run))
    }

    /// Whether a single digit repeats four times in a row
    pub fn has_repeated_digit(pin: &str) -> bool {
        pin.as_bytes()
            .windows(PIN_LENGTH)
            .any(|w| w.iter().all(|&b| b == w[0]))
    }
}

/// The deny-list of common PINs, built once on first use
pub fn common_pins() -> &'static HashSet<String> {
    static COMMON_PINS: OnceLock<HashSet<String>> = OnceLock::new();
    COMMON_PINS.get_or_init(build_common_pins)
}

fn build_common_pins() -> HashSet<String> {
    let mut pins = HashSet::with_capacity(200);

    // 0000 ... 9999
    for d in 0..=9u8 {
        pins.insert(digits(&[d, d, d, d]));
    }

    pins.extend(SEQUENTIAL_RUNS.iter().map(|run| run.to_string()));

    // ABAB and AABB for neighbouring digits: 0101, 1010, 1212, 1122, 2211, ...
    for a in 0..=9u8 {
        for b in [a.checked_sub(1), (a < 9).then(|| a + 1)].into_iter().flatten() {
            pins.insert(digits(&[a, b, a, b]));
            pins.insert(digits(&[a, a, b, b]));
        }
    }

    for year in FIRST_DENIED_YEAR..=LAST_DENIED_YEAR {
        pins.insert(year.to_string());
    }

    pins
}

fn digits(ds: &[u8]) -> String {
    ds.iter().map(|&d| char::from(b'0' + d)).collect()
}
