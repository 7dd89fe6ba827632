//! Errors surfaced by the edit-lock client.

use std::fmt;

use crate::domain::EntryLock;
use crate::error::ConflictReason;

/// A `409 Conflict` answer from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
    /// What the request conflicted with.
    pub reason: ConflictReason,
    /// Server's explanation.
    pub message: String,
    /// Lock held by someone else, when `reason` is `LockHeld`.
    pub lock: Option<EntryLock>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Client-side error for every edit-lock operation.
///
/// `Clone` so a session can keep the last error for display while also
/// returning it to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(String),

    /// No answer arrived within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The server refused the request because of a lock or a newer
    /// revision.
    #[error("conflict: {0}")]
    Conflict(ConflictError),

    /// The entry, logbook or revision does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success answer.
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server's explanation.
        message: String,
    },

    /// The answer could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The session was closed; late answers are discarded.
    #[error("edit session closed")]
    Closed,
}

impl ClientError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }

    /// Returns the conflict details for `409` answers.
    #[must_use]
    pub const fn conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
