//! Error types for Parley

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio output or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Analysis or speech collaborator returned an error or an unusable response
    #[error("service error: {0}")]
    Service(String),

    /// A collaborator fetch did not settle in time
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        /// Name of the fetch that timed out
        operation: &'static str,
        /// Timeout that elapsed
        limit: Duration,
    },

    /// Feature requires configuration that is missing (e.g. an API key)
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 payload decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
