//! Type-safe identifiers for logbooks, entries and edit locks.
//!
//! Logbook and entry ids are sequential integers handed out by the
//! registry, matching the URLs clients already bookmark
//! (`/logbooks/3/entries/42`). Lock ids are random UUIDs so a stale lock
//! can never be mistaken for its successor.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a logbook in the logbook tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct LogbookId(u64);

impl LogbookId {
    /// Wraps a raw numeric id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogbookId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a single logbook entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    /// Wraps a raw numeric id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unique identifier of one edit lock.
///
/// A steal cancels the current lock and creates a new one, so comparing
/// lock ids tells a client whether the lock it holds is still the active
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct LockId(uuid::Uuid);

impl LockId {
    /// Creates a new random `LockId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&EntryId::new(42)).unwrap_or_default();
        assert_eq!(json, "42");
        let Ok(id) = serde_json::from_str::<LogbookId>("7") else {
            panic!("deserialization failed");
        };
        assert_eq!(id.get(), 7);
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(LogbookId::new(3).to_string(), "3");
        assert_eq!(EntryId::from(12).to_string(), "12");
    }

    #[test]
    fn lock_ids_are_unique() {
        assert_ne!(LockId::new(), LockId::new());
        assert_eq!(LockId::default().to_string().len(), 36);
    }
}
