#![no_main]

use libfuzzer_sys::fuzz_target;
use tillguard_core::{ComplexityValidator, PinStrength, StrengthEvaluator};

fuzz_target!(|data: &[u8]| {
    let Ok(pin) = std::str::from_utf8(data) else {
        return;
    };

    // Neither call may panic on arbitrary input
    let verdict = ComplexityValidator::validate(pin);
    let strength = StrengthEvaluator::evaluate(pin);

    // Rejected exactly when graded weak
    assert_eq!(verdict.is_err(), strength == PinStrength::Weak);

    if !ComplexityValidator::is_well_formed(pin) {
        assert_eq!(strength, PinStrength::Weak);
    }
});
