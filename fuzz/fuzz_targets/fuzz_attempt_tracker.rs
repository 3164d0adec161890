#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tillguard_core::{AttemptTracker, LockoutPolicy, ManualClock};

#[derive(Debug, Arbitrary)]
enum Op {
    Fail(u8),
    Reset(u8),
    Peek(u8),
    Advance(u16),
    Sweep,
}

fuzz_target!(|ops: Vec<Op>| {
    let clock = Arc::new(ManualClock::starting_now());
    let policy = LockoutPolicy::default();
    let tracker = AttemptTracker::with_clock(policy.clone(), clock.clone());

    for op in ops.into_iter().take(512) {
        match op {
            Op::Fail(user) => {
                let status = tracker.record_failure(&format!("user-{}", user % 4));
                // Never locked before the threshold
                if status.attempts < policy.max_attempts {
                    assert!(!status.is_locked);
                } else {
                    assert!(status.is_locked);
                }
            }
            Op::Reset(user) => {
                tracker.reset(&format!("user-{}", user % 4));
            }
            Op::Peek(user) => {
                let status = tracker.is_locked(&format!("user-{}", user % 4));
                assert_eq!(status.is_locked, status.remaining.is_some());
                if status.is_locked {
                    assert!(status.attempts >= policy.max_attempts);
                }
            }
            Op::Advance(minutes) => {
                clock.advance(chrono::Duration::minutes(i64::from(minutes)));
            }
            Op::Sweep => {
                tracker.sweep();
            }
        }
        assert!(tracker.len() <= 4);
    }
});
