//! PIN operations for request handlers
//!
//! Every operation that checks a PIN follows the same order:
//!
//! 1. refuse immediately while the user is locked out (no comparison)
//! 2. reject malformed input without counting it
//! 3. on mismatch record the failure in the tracker and the user store
//! 4. on success reset the tracker and clear the stored counters
//!
//! Steps 1 to 4 run under a per-user lock, so concurrent requests for one
//! user are compared one at a time and never exceed the attempt limit.
//! Hashing runs on the blocking thread pool.
//!
//! The tracker is the decision authority. The stored counters let the
//! tracker be re-seeded after a restart (see [`PinService::with_rehydration`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tillguard_core::{
    AttemptTracker, ComplexityValidator, LockStatus, PinError, PinGenerator, PinStrength, Result,
    StrengthEvaluator,
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::ServiceConfig;
use crate::hasher::{Argon2PinHasher, PinHasher};
use crate::janitor::{Janitor, JanitorHandle};
use crate::store::{PinUser, UserStore};
use crate::user_lock::UserLocks;

/// PIN state of a user as reported to clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    pub is_pin_enabled: bool,
    pub lock: LockStatus,
}

/// PIN setup, verification, change and disable
pub struct PinService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PinHasher>,
    tracker: Arc<AttemptTracker>,
    rehydrate: bool,
    user_locks: UserLocks,
}

impl PinService {
    /// Create a service over the given collaborators
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PinHasher>,
        tracker: Arc<AttemptTracker>,
    ) -> Self {
        Self {
            store,
            hasher,
            tracker,
            rehydrate: true,
            user_locks: UserLocks::default(),
        }
    }

    /// Create a service with an Argon2id hasher and a fresh tracker
    pub fn from_config(config: &ServiceConfig, store: Arc<dyn UserStore>) -> Self {
        let tracker = Arc::new(AttemptTracker::new(config.lockout.clone()));
        Self::new(store, Arc::new(Argon2PinHasher::new()), tracker)
            .with_rehydration(config.rehydrate_from_store)
    }

    /// Build from config and start the stale-record sweep on the current
    /// tokio runtime
    pub fn start(config: &ServiceConfig, store: Arc<dyn UserStore>) -> (Self, JanitorHandle) {
        let service = Self::from_config(config, store);
        let janitor = Janitor::new(Arc::clone(&service.tracker), config.janitor_interval()).spawn();
        (service, janitor)
    }

    /// Whether to restore active lockouts from the stored counters of users
    /// the tracker has not seen yet. When off, the stored counters are an
    /// audit trail only and a restart clears every lockout.
    pub fn with_rehydration(mut self, enabled: bool) -> Self {
        self.rehydrate = enabled;
        self
    }

    /// The shared attempt tracker
    pub fn tracker(&self) -> &Arc<AttemptTracker> {
        &self.tracker
    }

    /// Set a PIN for a user who has none
    pub async fn setup_pin(&self, user_id: &str, pin: &str) -> Result<PinStrength> {
        let _serial = self.user_locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        if user.is_pin_enabled {
            return Err(PinError::AlreadyEnabled(user.id));
        }

        let strength = Self::check_new_pin(pin)?;
        let hash = self.hash_pin(pin).await?;
        self.store.set_pin(&user.id, &hash).await?;
        self.tracker.reset(&user.id);

        info!("PIN set up for {} ({})", user.id, strength);
        Ok(strength)
    }

    /// Verify a PIN
    pub async fn verify_pin(&self, user_id: &str, pin: &str) -> Result<()> {
        let _serial = self.user_locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        let hash = self.guard(&user)?;
        self.compare(&user, hash, pin).await
    }

    /// Replace the PIN after verifying the current one
    ///
    /// A wrong current PIN counts toward the lockout like any verification.
    pub async fn change_pin(&self, user_id: &str, current: &str, new: &str) -> Result<PinStrength> {
        let _serial = self.user_locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        let hash = self.guard(&user)?;
        let strength = Self::check_new_pin(new)?;

        self.compare(&user, hash, current).await?;
        if current == new {
            return Err(PinError::Unchanged);
        }

        let new_hash = self.hash_pin(new).await?;
        self.store.set_pin(&user.id, &new_hash).await?;

        info!("PIN changed for {} ({})", user.id, strength);
        Ok(strength)
    }

    /// Turn the PIN off after verifying it
    pub async fn disable_pin(&self, user_id: &str, current: &str) -> Result<()> {
        let _serial = self.user_locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        let hash = self.guard(&user)?;
        self.compare(&user, hash, current).await?;

        self.store.clear_pin(&user.id).await?;
        self.tracker.reset(&user.id);

        info!("PIN disabled for {}", user.id);
        Ok(())
    }

    /// Clear a lockout and its counters (administrative unlock)
    pub async fn unlock(&self, user_id: &str) -> Result<()> {
        let _serial = self.user_locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        self.tracker.reset(&user.id);
        self.store.clear_pin_attempts(&user.id).await?;

        info!("PIN lockout cleared for {}", user.id);
        Ok(())
    }

    /// Report whether the PIN is enabled and the current lock state
    pub async fn status(&self, user_id: &str) -> Result<PinStatus> {
        let user = self.load_user(user_id).await?;
        self.rehydrate(&user);
        Ok(PinStatus {
            is_pin_enabled: user.is_pin_enabled,
            lock: self.tracker.is_locked(&user.id),
        })
    }

    /// Suggest a random PIN that passes the complexity rules
    pub fn generate_pin(&self) -> String {
        PinGenerator::generate()
    }

    async fn load_user(&self, user_id: &str) -> Result<PinUser> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| PinError::NotFound(user_id.to_string()))
    }

    async fn hash_pin(&self, pin: &str) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let pin = Zeroizing::new(pin.to_string());
        tokio::task::spawn_blocking(move || hasher.hash(pin.as_str()))
            .await
            .map_err(|e| PinError::Crypto(format!("PIN hashing task failed: {}", e)))?
    }

    async fn verify_hash(&self, pin: &str, hash: &str) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let pin = Zeroizing::new(pin.to_string());
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(pin.as_str(), &hash))
            .await
            .map_err(|e| PinError::Crypto(format!("PIN verification task failed: {}", e)))?
    }

    fn check_new_pin(pin: &str) -> Result<PinStrength> {
        ComplexityValidator::validate(pin)?;
        match StrengthEvaluator::evaluate(pin) {
            PinStrength::Weak => Err(PinError::TooWeak),
            strength => Ok(strength),
        }
    }

    fn rehydrate(&self, user: &PinUser) {
        if self.rehydrate {
            self.tracker
                .restore(&user.id, user.failed_pin_attempts, user.pin_locked_until);
        }
    }

    /// PIN enabled and not locked; returns the stored hash
    fn guard<'a>(&self, user: &'a PinUser) -> Result<&'a str> {
        let hash = match (&user.pin_hash, user.is_pin_enabled) {
            (Some(hash), true) => hash.as_str(),
            _ => return Err(PinError::NotEnabled(user.id.clone())),
        };

        self.rehydrate(user);
        let lock = self.tracker.is_locked(&user.id);
        if let (true, Some(remaining), Some(locked_until)) =
            (lock.is_locked, lock.remaining, lock.locked_until)
        {
            debug!("Refusing PIN check for locked user {}", user.id);
            return Err(PinError::Locked {
                remaining,
                attempts: lock.attempts,
                locked_until,
            });
        }

        Ok(hash)
    }

    async fn compare(&self, user: &PinUser, hash: &str, pin: &str) -> Result<()> {
        if !ComplexityValidator::is_well_formed(pin) {
            return Err(PinError::Format);
        }

        if self.verify_hash(pin, hash).await? {
            self.tracker.reset(&user.id);
            self.store.clear_pin_attempts(&user.id).await?;
            return Ok(());
        }

        let status = self.tracker.record_failure(&user.id);
        self.store
            .record_pin_attempts(&user.id, status.attempts, status.locked_until)
            .await?;

        let remaining = self.tracker.policy().attempts_remaining(status.attempts);
        warn!(
            "Incorrect PIN for {} ({} failed attempts)",
            user.id, status.attempts
        );

        Err(PinError::Mismatch {
            attempts: status.attempts,
            remaining,
            locked_until: status.locked_until.filter(|_| status.is_locked),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;
    use chrono::Duration;
    use tillguard_core::{Clock, ComplexityViolation, LockoutPolicy, ManualClock};

    /// Plaintext "hasher" so tests don't pay for Argon2
    struct PlainHasher;

    impl PinHasher for PlainHasher {
        fn hash(&self, pin: &str) -> Result<String> {
            Ok(format!("plain:{pin}"))
        }

        fn verify(&self, pin: &str, hash: &str) -> Result<bool> {
            Ok(hash == format!("plain:{pin}"))
        }
    }

    struct Fixture {
        service: PinService,
        store: MemoryUserStore,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        let store = MemoryUserStore::new();
        store.insert(PinUser::new("alice")).await;
        store.insert(PinUser::new("bob")).await;

        let clock = Arc::new(ManualClock::starting_now());
        let tracker = Arc::new(AttemptTracker::with_clock(
            LockoutPolicy::default(),
            clock.clone(),
        ));
        let service = PinService::new(Arc::new(store.clone()), Arc::new(PlainHasher), tracker);

        Fixture {
            service,
            store,
            clock,
        }
    }

    async fn fixture_with_pin() -> Fixture {
        let fx = fixture().await;
        fx.service.setup_pin("alice", "7294").await.unwrap();
        fx
    }

    #[tokio::test]
    async fn test_setup_reports_strength() {
        let fx = fixture().await;
        assert_eq!(
            fx.service.setup_pin("alice", "7294").await.unwrap(),
            PinStrength::Strong
        );
        assert_eq!(
            fx.service.setup_pin("bob", "1313").await.unwrap(),
            PinStrength::Medium
        );

        let user = fx.store.get_user("alice").await.unwrap().unwrap();
        assert!(user.is_pin_enabled);
        assert_eq!(user.pin_hash.as_deref(), Some("plain:7294"));
    }

    #[tokio::test]
    async fn test_setup_rejects_weak_and_malformed() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.setup_pin("alice", "1234").await,
            Err(PinError::Policy(ComplexityViolation::Common))
        ));
        assert!(matches!(
            fx.service.setup_pin("alice", "12a4").await,
            Err(PinError::Format)
        ));
        assert!(!fx.store.get_user("alice").await.unwrap().unwrap().is_pin_enabled);
    }

    #[tokio::test]
    async fn test_setup_twice_rejected() {
        let fx = fixture_with_pin().await;
        assert!(matches!(
            fx.service.setup_pin("alice", "3085").await,
            Err(PinError::AlreadyEnabled(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_users() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.verify_pin("ghost", "7294").await,
            Err(PinError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.verify_pin("bob", "7294").await,
            Err(PinError::NotEnabled(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_success_clears_counters() {
        let fx = fixture_with_pin().await;
        assert!(fx.service.verify_pin("alice", "0000").await.is_err());
        assert!(fx.service.verify_pin("alice", "1111").await.is_err());

        fx.service.verify_pin("alice", "7294").await.unwrap();

        let user = fx.store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.failed_pin_attempts, 0);
        assert!(user.pin_locked_until.is_none());
        assert_eq!(fx.service.tracker().is_locked("alice").attempts, 0);
    }

    #[tokio::test]
    async fn test_malformed_attempt_not_counted() {
        let fx = fixture_with_pin().await;
        assert!(matches!(
            fx.service.verify_pin("alice", "72945").await,
            Err(PinError::Format)
        ));
        assert_eq!(fx.service.tracker().is_locked("alice").attempts, 0);
    }

    #[tokio::test]
    async fn test_lockout_is_persisted_and_enforced() {
        let fx = fixture_with_pin().await;

        for expected in 1..=4u32 {
            match fx.service.verify_pin("alice", "0000").await {
                Err(PinError::Mismatch {
                    attempts,
                    remaining,
                    locked_until,
                }) => {
                    assert_eq!(attempts, expected);
                    assert_eq!(remaining, 5 - expected);
                    assert!(locked_until.is_none());
                }
                other => panic!("unexpected: {other:?}"),
            }
        }

        let err = fx.service.verify_pin("alice", "0000").await.unwrap_err();
        assert!(matches!(
            err,
            PinError::Mismatch {
                attempts: 5,
                remaining: 0,
                locked_until: Some(_)
            }
        ));

        let user = fx.store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.failed_pin_attempts, 5);
        assert_eq!(
            user.pin_locked_until,
            Some(fx.clock.now() + Duration::minutes(30))
        );

        // The correct PIN is refused while locked, and not compared
        match fx.service.verify_pin("alice", "7294").await {
            Err(PinError::Locked {
                attempts,
                remaining,
                ..
            }) => {
                assert_eq!(attempts, 5);
                assert_eq!(remaining.as_secs(), 30 * 60);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fx.service.tracker().is_locked("alice").attempts, 5);

        fx.clock.advance(Duration::minutes(31));
        fx.service.verify_pin("alice", "7294").await.unwrap();
    }

    #[tokio::test]
    async fn test_change_pin() {
        let fx = fixture_with_pin().await;

        assert!(matches!(
            fx.service.change_pin("alice", "7294", "7294").await,
            Err(PinError::Unchanged)
        ));
        assert!(matches!(
            fx.service.change_pin("alice", "7294", "4321").await,
            Err(PinError::Policy(_))
        ));
        assert!(matches!(
            fx.service.change_pin("alice", "0000", "3085").await,
            Err(PinError::Mismatch { attempts: 1, .. })
        ));

        assert_eq!(
            fx.service.change_pin("alice", "7294", "3085").await.unwrap(),
            PinStrength::Strong
        );
        fx.service.verify_pin("alice", "3085").await.unwrap();
        assert!(fx.service.verify_pin("alice", "7294").await.is_err());
    }

    #[tokio::test]
    async fn test_disable_pin() {
        let fx = fixture_with_pin().await;
        assert!(fx.service.disable_pin("alice", "1111").await.is_err());

        fx.service.disable_pin("alice", "7294").await.unwrap();
        let status = fx.service.status("alice").await.unwrap();
        assert!(!status.is_pin_enabled);
        assert_eq!(status.lock, LockStatus::default());

        let user = fx.store.get_user("alice").await.unwrap().unwrap();
        assert!(user.pin_hash.is_none());
    }

    #[tokio::test]
    async fn test_unlock() {
        let fx = fixture_with_pin().await;
        for _ in 0..5 {
            let _ = fx.service.verify_pin("alice", "0000").await;
        }
        assert!(fx.service.status("alice").await.unwrap().lock.is_locked);

        fx.service.unlock("alice").await.unwrap();
        assert!(!fx.service.status("alice").await.unwrap().lock.is_locked);
        let user = fx.store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.failed_pin_attempts, 0);

        fx.service.verify_pin("alice", "7294").await.unwrap();
    }

    #[tokio::test]
    async fn test_lockout_survives_restart_with_rehydration() {
        let fx = fixture_with_pin().await;
        for _ in 0..5 {
            let _ = fx.service.verify_pin("alice", "0000").await;
        }

        // New process: same store, empty tracker
        let tracker = Arc::new(AttemptTracker::with_clock(
            LockoutPolicy::default(),
            fx.clock.clone(),
        ));
        let restarted =
            PinService::new(Arc::new(fx.store.clone()), Arc::new(PlainHasher), tracker);

        assert!(matches!(
            restarted.verify_pin("alice", "7294").await,
            Err(PinError::Locked { attempts: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_restart_without_rehydration_forgets_lockout() {
        let fx = fixture_with_pin().await;
        for _ in 0..5 {
            let _ = fx.service.verify_pin("alice", "0000").await;
        }

        let tracker = Arc::new(AttemptTracker::with_clock(
            LockoutPolicy::default(),
            fx.clock.clone(),
        ));
        let restarted =
            PinService::new(Arc::new(fx.store.clone()), Arc::new(PlainHasher), tracker)
                .with_rehydration(false);

        restarted.verify_pin("alice", "7294").await.unwrap();
    }

    /// Counts comparisons and takes long enough for requests to overlap
    #[derive(Default)]
    struct SlowHasher {
        compared: std::sync::atomic::AtomicUsize,
    }

    impl PinHasher for SlowHasher {
        fn hash(&self, pin: &str) -> Result<String> {
            PlainHasher.hash(pin)
        }

        fn verify(&self, pin: &str, hash: &str) -> Result<bool> {
            self.compared
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            PlainHasher.verify(pin, hash)
        }
    }

    fn slow_service(store: &MemoryUserStore, hasher: &Arc<SlowHasher>) -> Arc<PinService> {
        let tracker = Arc::new(AttemptTracker::with_clock(
            LockoutPolicy::default(),
            Arc::new(ManualClock::starting_now()),
        ));
        Arc::new(PinService::new(
            Arc::new(store.clone()),
            hasher.clone(),
            tracker,
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_guesses_bounded_by_max_attempts() {
        let store = MemoryUserStore::new();
        store.insert(PinUser::new("alice")).await;
        let hasher = Arc::new(SlowHasher::default());
        let service = slow_service(&store, &hasher);
        service.setup_pin("alice", "7294").await.unwrap();

        let guesses: Vec<_> = (0..40)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.verify_pin("alice", "0000").await })
            })
            .collect();

        let (mut mismatched, mut locked) = (0, 0);
        for guess in guesses {
            match guess.await.unwrap() {
                Err(PinError::Mismatch { .. }) => mismatched += 1,
                Err(PinError::Locked { .. }) => locked += 1,
                other => panic!("unexpected: {other:?}"),
            }
        }

        assert_eq!(mismatched, 5);
        assert_eq!(locked, 35);
        assert_eq!(
            hasher.compared.load(std::sync::atomic::Ordering::SeqCst),
            5
        );
        assert_eq!(service.tracker().is_locked("alice").attempts, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_correct_guess_in_burst_cannot_reopen_window() {
        let store = MemoryUserStore::new();
        store.insert(PinUser::new("alice")).await;
        let hasher = Arc::new(SlowHasher::default());
        let service = slow_service(&store, &hasher);
        service.setup_pin("alice", "7294").await.unwrap();

        // One correct PIN among the guesses resets the counter at most once,
        // so no more than two full windows of guesses are ever compared.
        let guesses: Vec<_> = (0..30)
            .map(|i| {
                let service = Arc::clone(&service);
                let pin = if i == 3 { "7294" } else { "0000" };
                tokio::spawn(async move { service.verify_pin("alice", pin).await })
            })
            .collect();
        for guess in guesses {
            let _ = guess.await.unwrap();
        }

        assert!(hasher.compared.load(std::sync::atomic::Ordering::SeqCst) <= 11);
        assert!(service.tracker().is_locked("alice").is_locked);
    }

    /// Blocks each comparison until the test opens the gate
    struct GatedHasher {
        gate: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PinHasher for GatedHasher {
        fn hash(&self, pin: &str) -> Result<String> {
            PlainHasher.hash(pin)
        }

        fn verify(&self, pin: &str, hash: &str) -> Result<bool> {
            let gate = self.gate.lock().unwrap();
            gate.recv_timeout(std::time::Duration::from_secs(2))
                .map_err(|_| PinError::Crypto("gate never opened".into()))?;
            PlainHasher.verify(pin, hash)
        }
    }

    #[tokio::test]
    async fn test_hashing_does_not_block_runtime() {
        let (open, gate) = std::sync::mpsc::channel();
        let store = MemoryUserStore::new();
        store.insert(PinUser::new("alice")).await;
        let tracker = Arc::new(AttemptTracker::new(LockoutPolicy::default()));
        let service = Arc::new(PinService::new(
            Arc::new(store.clone()),
            Arc::new(GatedHasher {
                gate: std::sync::Mutex::new(gate),
            }),
            tracker,
        ));
        service.setup_pin("alice", "7294").await.unwrap();

        let pending = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.verify_pin("alice", "7294").await })
        };

        // Single-threaded runtime: this only runs if the comparison is off
        // the runtime thread.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        open.send(()).unwrap();

        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_generated_pin_can_be_set_up() {
        let fx = fixture().await;
        let pin = fx.service.generate_pin();
        assert!(fx.service.setup_pin("alice", &pin).await.is_ok());
    }
}
