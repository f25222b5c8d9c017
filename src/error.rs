//! Error types for Assistive Visions

use thiserror::Error;

/// Result type alias for Assistive Visions operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Assistive Visions
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Object detection error
    #[error("detection error: {0}")]
    Detection(String),

    /// Assistant error
    #[error("assistant error: {0}")]
    Assistant(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
