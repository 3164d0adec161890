//! Error types for the service runtime (config and startup)
//!
//! PIN operations themselves return [`tillguard_core::PinError`].

use thiserror::Error;

/// Result type alias for service runtime operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
