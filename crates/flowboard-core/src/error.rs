//! Error types for flowboard.

use thiserror::Error;

/// Result type alias using flowboard's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for flowboard realtime operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Incoming event is missing a required field or carries an unknown action.
    /// Rejected at the ingest boundary; the store is left untouched.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// A registered subscriber failed while handling a snapshot.
    #[error("Subscriber {subscriber} failed: {message}")]
    SubscriberFailure { subscriber: u64, message: String },

    /// The upstream event source went away. Informational only.
    #[error("Event source disconnected: {0}")]
    SourceDisconnected(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a [`Error::MalformedEvent`] with a formatted reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedEvent(reason.into())
    }

    /// True for errors that reject an `ingest` call.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::MalformedEvent(_) | Error::Serialization(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
