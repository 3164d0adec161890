#![no_main]

use libfuzzer_sys::fuzz_target;
use tillguard_core::LockoutPolicy;

fuzz_target!(|data: &[u8]| {
    // Parsing a policy from untrusted JSON should not panic
    if let Ok(policy) = serde_json::from_slice::<LockoutPolicy>(data) {
        let _ = policy.should_lock(policy.max_attempts);
        let _ = policy.attempts_remaining(0);
        let _ = policy.describe(policy.max_attempts, Some(policy.lockout_duration));

        let json = serde_json::to_string(&policy).unwrap();
        let reparsed: LockoutPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, reparsed);
    }
});
