//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the server. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! The same response shape is decoded again by the edit-lock client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{EntryId, EntryLock, LogbookId};

/// Why a write was refused with `409 Conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// An active edit lock belongs to another client.
    LockHeld,
    /// The entry changed since the client fetched it.
    StaleRevision,
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "entry 42 is locked by 10.0.0.1 since 2024-05-01T10:00:00Z",
///     "reason": "lock_held"
///   },
///   "lock": { "owned_by_ip": "10.0.0.1", "...": "..." }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
    /// The conflicting lock, for `lock_held` conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<EntryLock>,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`GatewayError`] for the ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Conflict discriminator, present on `409` responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConflictReason>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                    |
/// |-----------|------------------|--------------------------------|
/// | 1000–1999 | Validation       | 400 Bad Request / 422          |
/// | 2000–2099 | Not Found        | 404 Not Found                  |
/// | 2100–2199 | Conflict         | 409 Conflict                   |
/// | 3000–3999 | Server           | 500 Internal Server Error      |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Logbook with the given ID was not found.
    #[error("logbook not found: {0}")]
    LogbookNotFound(LogbookId),

    /// Entry with the given ID was not found.
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),

    /// The requested revision of an entry does not exist.
    #[error("entry {entry_id} has no revision {revision_n}")]
    RevisionNotFound {
        /// Entry that was asked for.
        entry_id: EntryId,
        /// Revision that was asked for.
        revision_n: u32,
    },

    /// No active lock exists on the entry.
    #[error("entry {0} is not locked")]
    LockNotFound(EntryId),

    /// Write refused because of a lock or a newer revision.
    #[error("{message}")]
    Conflict {
        /// What the write conflicted with.
        reason: ConflictReason,
        /// Human-readable description.
        message: String,
        /// The lock held by someone else, for [`ConflictReason::LockHeld`].
        lock: Option<Box<EntryLock>>,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An update did not say which revision it was based on.
    #[error("missing 'revision_n' field")]
    MissingRevision,

    /// An attribute value does not match the logbook's definition.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Builds a [`ConflictReason::LockHeld`] conflict for `lock`.
    #[must_use]
    pub fn locked(lock: &EntryLock) -> Self {
        Self::Conflict {
            reason: ConflictReason::LockHeld,
            message: format!(
                "entry {} is locked by {} since {}",
                lock.entry_id,
                lock.owned_by_ip,
                lock.created_at.to_rfc3339()
            ),
            lock: Some(Box::new(lock.clone())),
        }
    }

    /// Builds a [`ConflictReason::StaleRevision`] conflict.
    #[must_use]
    pub fn stale_revision(entry_id: EntryId, sent: u32, current: u32) -> Self {
        Self::Conflict {
            reason: ConflictReason::StaleRevision,
            message: format!(
                "entry {entry_id} has been edited since you loaded it \
                 (revision {sent}, now {current})"
            ),
            lock: None,
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MissingRevision => 1002,
            Self::InvalidAttribute(_) => 1003,
            Self::LogbookNotFound(_) => 2001,
            Self::EntryNotFound(_) => 2002,
            Self::RevisionNotFound { .. } => 2003,
            Self::LockNotFound(_) => 2004,
            Self::Conflict {
                reason: ConflictReason::LockHeld,
                ..
            } => 2101,
            Self::Conflict {
                reason: ConflictReason::StaleRevision,
                ..
            } => 2102,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MissingRevision => StatusCode::BAD_REQUEST,
            Self::InvalidAttribute(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LogbookNotFound(_)
            | Self::EntryNotFound(_)
            | Self::RevisionNotFound { .. }
            | Self::LockNotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();
        let (reason, lock) = match self {
            Self::Conflict { reason, lock, .. } => (Some(reason), lock.map(|l| *l)),
            _ => (None, None),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                reason,
            },
            lock,
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
