//! Suggested PIN generation
//!
//! Draws uniformly from 1000..=9999 and rejects anything graded `Weak`.
//! Generated PINs never start with 0, although user-chosen PINs may.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::strength::{PinStrength, StrengthEvaluator};

/// Smallest PIN the generator produces
pub const MIN_GENERATED: u16 = 1000;
/// Largest PIN the generator produces
pub const MAX_GENERATED: u16 = 9999;

/// Draws before falling back to the precomputed list.
///
/// Roughly 2% of the range is weak, so hitting this cap is practically
/// impossible; the cap only bounds the worst case.
pub const MAX_DRAWS: usize = 64;

/// Random PIN generator
pub struct PinGenerator;

impl PinGenerator {
    /// Generate a PIN that is not `Weak`, using the thread-local RNG
    pub fn generate() -> String {
        Self::generate_with_rng(&mut rand::thread_rng())
    }

    /// Generate a PIN that is not `Weak` from the given RNG
    pub fn generate_with_rng<R: Rng + ?Sized>(rng: &mut R) -> String {
        for _ in 0..MAX_DRAWS {
            let pin = rng.gen_range(MIN_GENERATED..=MAX_GENERATED).to_string();
            if StrengthEvaluator::evaluate(&pin) != PinStrength::Weak {
                return pin;
            }
        }

        tracing::warn!("PIN generator exhausted {} draws, using fallback list", MAX_DRAWS);
        Self::acceptable_pins()
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "7294".to_string())
    }

    /// Every PIN in the generated range that is not `Weak`
    pub fn acceptable_pins() -> Vec<String> {
        (MIN_GENERATED..=MAX_GENERATED)
            .map(|n| n.to_string())
            .filter(|pin| StrengthEvaluator::evaluate(pin) != PinStrength::Weak)
            .collect()
    }
}
