//! User store abstraction
//!
//! The user record and its schema belong to the host application. The PIN
//! service only reads the user and writes four fields: the PIN hash, the
//! enabled flag and the durable failure counters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tillguard_core::{PinError, Result};
use tokio::sync::RwLock;

/// The PIN-related view of a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinUser {
    pub id: String,
    /// PHC-format hash of the PIN
    pub pin_hash: Option<String>,
    pub is_pin_enabled: bool,
    pub failed_pin_attempts: u32,
    pub pin_locked_until: Option<DateTime<Utc>>,
}

impl PinUser {
    /// A user without a PIN
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Durable user storage used by [`crate::PinService`]
///
/// Every method returns `PinError::Storage` on infrastructure failure.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user by id
    async fn get_user(&self, user_id: &str) -> Result<Option<PinUser>>;

    /// Store a new PIN hash, enable the PIN and clear the counters
    async fn set_pin(&self, user_id: &str, pin_hash: &str) -> Result<()>;

    /// Remove the PIN hash, disable the PIN and clear the counters
    async fn clear_pin(&self, user_id: &str) -> Result<()>;

    /// Write the failure counters after a mismatch
    async fn record_pin_attempts(
        &self,
        user_id: &str,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Reset the failure counters to `0` / `None`
    async fn clear_pin_attempts(&self, user_id: &str) -> Result<()>;
}

/// In-memory user store (for development and tests)
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, PinUser>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user
    pub async fn insert(&self, user: PinUser) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    async fn update<F>(&self, user_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut PinUser) + Send,
    {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| PinError::NotFound(user_id.to_string()))?;
        f(user);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<PinUser>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn set_pin(&self, user_id: &str, pin_hash: &str) -> Result<()> {
        let pin_hash = pin_hash.to_string();
        self.update(user_id, move |user| {
            user.pin_hash = Some(pin_hash);
            user.is_pin_enabled = true;
            user.failed_pin_attempts = 0;
            user.pin_locked_until = None;
        })
        .await
    }

    async fn clear_pin(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |user| {
            user.pin_hash = None;
            user.is_pin_enabled = false;
            user.failed_pin_attempts = 0;
            user.pin_locked_until = None;
        })
        .await
    }

    async fn record_pin_attempts(
        &self,
        user_id: &str,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update(user_id, move |user| {
            user.failed_pin_attempts = attempts;
            user.pin_locked_until = locked_until;
        })
        .await
    }

    async fn clear_pin_attempts(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |user| {
            user.failed_pin_attempts = 0;
            user.pin_locked_until = None;
        })
        .await
    }
}
