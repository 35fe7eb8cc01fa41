//! Error types for the FAQ chatbot

use thiserror::Error;

/// Result type alias for chatbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chatbot errors
///
/// `Config` and `ClientInit` are terminal for a session. `Retrieval`,
/// `Generation` and `SafetyValidation` are recovered inside a turn and never
/// reach the turn loop.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid credential/configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation or warehouse client could not be constructed
    #[error("Client initialization failed: {0}")]
    ClientInit(String),

    /// Warehouse vector-search query failed
    #[error("Context retrieval failed: {0}")]
    Retrieval(String),

    /// Remote generation call failed
    #[error("Response generation failed: {0}")]
    Generation(String),

    /// Prompt screening could not be completed
    #[error("Safety validation error: {0}")]
    SafetyValidation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a client initialization error
    pub fn client_init(message: impl Into<String>) -> Self {
        Self::ClientInit(message.into())
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error ends the session rather than a single turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::ClientInit(_))
    }
}
