//! PIN hashing
//!
//! PINs are hashed with Argon2id into PHC strings. The PIN bytes are held in
//! a `Zeroizing` buffer while hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tillguard_core::{PinError, Result};
use zeroize::Zeroizing;

/// One-way PIN hash and comparison
pub trait PinHasher: Send + Sync {
    /// Hash a PIN into a self-describing string
    fn hash(&self, pin: &str) -> Result<String>;

    /// Compare a candidate PIN against a stored hash
    fn verify(&self, pin: &str, hash: &str) -> Result<bool>;
}

/// Argon2id hasher with default parameters
#[derive(Clone, Default)]
pub struct Argon2PinHasher {
    argon2: Argon2<'static>,
}

impl Argon2PinHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with a custom memory cost (KiB) and iteration count
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PinError::Crypto(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PinHasher for Argon2PinHasher {
    fn hash(&self, pin: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());

        let hash = self
            .argon2
            .hash_password(&pin_bytes, &salt)
            .map_err(|e| PinError::Crypto(format!("Failed to hash PIN: {}", e)))?
            .to_string();

        Ok(hash)
    }

    fn verify(&self, pin: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PinError::Crypto(format!("Invalid stored hash: {}", e)))?;

        // Constant-time comparison inside argon2
        let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());
        Ok(self.argon2.verify_password(&pin_bytes, &parsed_hash).is_ok())
    }
}
