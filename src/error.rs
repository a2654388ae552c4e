//! Error types for the Skygate gateway.

use thiserror::Error;

/// Main error type for Skygate operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A quota with a zero limit or a zero window
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Skygate operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
