//! Service configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tillguard_core::{LockoutPolicy, JANITOR_INTERVAL_SECS};

use crate::error::{Result, ServiceError};

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "TILLGUARD_CONFIG";

/// PIN service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Failed-attempt lockout policy
    pub lockout: LockoutPolicy,

    /// Seconds between stale-record sweeps
    pub janitor_interval_secs: u64,

    /// Seed the in-memory tracker from the user store's durable counters
    /// the first time a user is seen, so lockouts survive a restart
    pub rehydrate_from_store: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lockout: LockoutPolicy::default(),
            janitor_interval_secs: JANITOR_INTERVAL_SECS,
            rehydrate_from_store: true,
        }
    }
}

impl ServiceConfig {
    /// Sweep period as a `Duration`
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    /// `$TILLGUARD_CONFIG`, else `<config dir>/tillguard/service.json`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("tillguard")
                    .join("service.json")
            })
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise write and return the defaults
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        tracing::info!("Created default config at {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would disable or cut short the lockout, or stop
    /// the sweep
    pub fn validate(&self) -> Result<()> {
        if self.lockout.max_attempts == 0 {
            return Err(ServiceError::Config(
                "lockout.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout.lockout_duration.is_zero() {
            return Err(ServiceError::Config(
                "lockout.lockout_duration must be non-zero".to_string(),
            ));
        }
        if self.lockout.lockout_duration > self.lockout.reset_window {
            // An idle reset would otherwise clear a lockout that is still running
            return Err(ServiceError::Config(
                "lockout.lockout_duration must not exceed lockout.reset_window".to_string(),
            ));
        }
        if self.janitor_interval_secs == 0 {
            return Err(ServiceError::Config(
                "janitor_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
