//! Error handling for the broker.

use thiserror::Error;

/// Main error type for the broker
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (invalid fractions, non-divisible horizon or stake)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Precondition violations (trade count out of range, forecast length mismatch, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No candidate trade satisfies the loss-risk bound
    #[error("No feasible order: all {candidates} candidates violate the risk bound or failed")]
    Infeasible { candidates: usize },

    /// Numerical problems while valuing a single candidate
    #[error("Computation error: {0}")]
    Computation(String),

    /// A thread panicked while holding the shared broker
    #[error("Broker lock poisoned")]
    Poisoned,

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Result type for the broker
pub type Result<T> = std::result::Result<T, Error>;
