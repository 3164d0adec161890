//! Tillguard Service - PIN operations for point-of-sale request handlers
//!
//! Wires the policy from `tillguard-core` to a user store and a PIN hasher:
//!
//! - [`PinService`] - setup, verify, change, disable, unlock and status
//! - [`UserStore`] - the durable user view (host application owns the schema)
//! - [`PinHasher`] - one-way PIN hashing (Argon2id by default)
//! - [`Janitor`] - periodic eviction of stale attempt records
//!
//! # Deployment note
//!
//! Attempt counts live in memory per process. Behind a load balancer with
//! several backends each instance counts failures independently; the stored
//! counters only restore active lockouts after a restart.

pub mod config;
pub mod error;
pub mod hasher;
pub mod janitor;
pub mod service;
pub mod store;
mod user_lock;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use hasher::{Argon2PinHasher, PinHasher};
pub use janitor::{Janitor, JanitorHandle};
pub use service::{PinService, PinStatus};
pub use store::{MemoryUserStore, PinUser, UserStore};
