//! Error types for the fraud engine

use thiserror::Error;

/// Fraud engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Order context failed validation
    #[error("Invalid order context: {0}")]
    InvalidOrder(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
