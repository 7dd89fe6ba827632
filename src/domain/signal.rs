//! Server-side signals raised after logbooks and entries change.
//!
//! The service publishes an [`ActionSignal`] on the server's
//! [`super::EventBus`] under the signal's own topic. Configured actions
//! (notifications, exports, audit logging) subscribe to the topics they
//! care about.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EntryId, LogbookId};

/// Topic for [`ActionSignal::NewEntry`].
pub const NEW_ENTRY: &str = "entry.new";
/// Topic for [`ActionSignal::EditEntry`].
pub const EDIT_ENTRY: &str = "entry.edit";
/// Topic for [`ActionSignal::NewLogbook`].
pub const NEW_LOGBOOK: &str = "logbook.new";
/// Topic for [`ActionSignal::EditLogbook`].
pub const EDIT_LOGBOOK: &str = "logbook.edit";

/// Every topic a server bus may carry.
pub const ALL_TOPICS: [&str; 4] = [NEW_ENTRY, EDIT_ENTRY, NEW_LOGBOOK, EDIT_LOGBOOK];

/// Something that configured actions may react to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ActionSignal {
    /// An entry was created.
    NewEntry {
        /// Logbook of the entry.
        logbook_id: LogbookId,
        /// The new entry.
        entry_id: EntryId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },
    /// An entry edit was accepted.
    EditEntry {
        /// Logbook of the entry.
        logbook_id: LogbookId,
        /// The edited entry.
        entry_id: EntryId,
        /// Revision number after the edit.
        revision_n: u32,
        /// Edit timestamp.
        timestamp: DateTime<Utc>,
    },
    /// A logbook was created.
    NewLogbook {
        /// The new logbook.
        logbook_id: LogbookId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },
    /// A logbook's metadata changed.
    EditLogbook {
        /// The edited logbook.
        logbook_id: LogbookId,
        /// Edit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ActionSignal {
    /// Returns the bus topic this signal is published on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::NewEntry { .. } => NEW_ENTRY,
            Self::EditEntry { .. } => EDIT_ENTRY,
            Self::NewLogbook { .. } => NEW_LOGBOOK,
            Self::EditLogbook { .. } => EDIT_LOGBOOK,
        }
    }

    /// Returns the logbook the signal concerns.
    #[must_use]
    pub const fn logbook_id(&self) -> LogbookId {
        match self {
            Self::NewEntry { logbook_id, .. }
            | Self::EditEntry { logbook_id, .. }
            | Self::NewLogbook { logbook_id, .. }
            | Self::EditLogbook { logbook_id, .. } => *logbook_id,
        }
    }
}
