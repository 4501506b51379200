//! Error types for Playchain Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Stream id is not set. Add your stream id to the url as a query parameter such as ?id={{STREAM_ID}}")]
    MissingStreamId,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Resource errors
    /// Both naming candidates of a probe were missing. The display string is
    /// the condition name hosts match on.
    #[error("resource_is_not_available")]
    ResourceNotAvailable,

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Data channel error: {0}")]
    DataChannel(String),

    #[error("Failed to load component {module}: {reason}")]
    ModuleLoad { module: String, reason: String },

    // Lifecycle errors
    #[error("Player is not initialized")]
    NotInitialized,

    #[error("Player is closed")]
    PlayerClosed,
}

impl Error {
    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Returns true if the orchestrator recovers from this error on its own
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ResourceNotAvailable
                | Error::Network(_)
                | Error::Engine(_)
                | Error::DataChannel(_)
        )
    }

    /// Returns the error code reported in logs and to hosts
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingStreamId => "MISSING_STREAM_ID",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::ResourceNotAvailable => "RESOURCE_NOT_AVAILABLE",
            Error::Network(_) => "NETWORK",
            Error::Engine(_) => "ENGINE",
            Error::DataChannel(_) => "DATA_CHANNEL",
            Error::ModuleLoad { .. } => "MODULE_LOAD",
            Error::NotInitialized => "NOT_INITIALIZED",
            Error::PlayerClosed => "PLAYER_CLOSED",
        }
    }
}
