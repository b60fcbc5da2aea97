use thiserror::Error;

use crate::SessionKey;

/// Errors returned by a [`crate::SessionService`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session exists for the key.
    #[error("session {0} not found")]
    NotFound(SessionKey),
    /// A session with the requested id already exists.
    #[error("session {0} already exists")]
    AlreadyExists(SessionKey),
    /// State or events could not be (de)serialized.
    #[error("failed to serialize session data: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in storage: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
    /// The database reported an error.
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
