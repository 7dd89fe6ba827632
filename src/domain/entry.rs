//! Logbook entries and the edits applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::{EntryId, LogbookId};

/// Someone credited on an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Account name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Contact address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Author {
    /// Creates an author known only by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            login: None,
            email: None,
        }
    }
}

/// Priority of pinned entries. Entries above it are important and are also
/// listed in the logbooks below their own.
pub const PINNED_PRIORITY: i32 = 100;

fn default_content_type() -> String {
    "text/html".to_string()
}

/// A dated entry in a logbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    /// Entry identifier.
    pub id: EntryId,
    /// Logbook the entry belongs to.
    pub logbook_id: LogbookId,
    /// Title line.
    pub title: String,
    /// People credited on the entry.
    pub authors: Vec<Author>,
    /// Body, interpreted according to `content_type`.
    pub content: String,
    /// MIME type of `content`.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Attribute values, checked against the logbook's definitions.
    #[schema(value_type = Object)]
    pub attributes: Map<String, Value>,
    /// Entry this one is a followup to.
    pub follows_id: Option<EntryId>,
    /// Archived entries are hidden from listings by default.
    pub archived: bool,
    /// Sort priority; listings put higher values first. See
    /// [`PINNED_PRIORITY`].
    pub priority: i32,
    /// Number of accepted edits. Clients send it back with an update so
    /// the server can reject edits based on an outdated copy.
    pub revision_n: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last accepted edit.
    pub last_changed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewEntry {
    /// Title line.
    #[serde(default)]
    pub title: String,
    /// People credited on the entry.
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Body; the logbook template is used when empty.
    #[serde(default)]
    pub content: String,
    /// MIME type of `content`.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Attribute values.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: Map<String, Value>,
    /// Entry this one is a followup to.
    #[serde(default)]
    pub follows_id: Option<EntryId>,
    /// Sort priority.
    #[serde(default)]
    pub priority: i32,
}

/// An edit to an existing entry. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntryChange {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New author list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<Author>>,
    /// New body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New MIME type of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Replacement attribute set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    /// Archive or restore the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    /// New sort priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Revision the edit was based on. Required by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_n: Option<u32>,
}

impl Entry {
    /// Applies `change`, bumping `revision_n` and `last_changed_at`.
    ///
    /// Attribute values must already have been checked by the caller.
    pub fn apply(&mut self, change: EntryChange, now: DateTime<Utc>) {
        if let Some(title) = change.title {
            self.title = title;
        }
        if let Some(authors) = change.authors {
            self.authors = authors;
        }
        if let Some(content) = change.content {
            self.content = content;
        }
        if let Some(content_type) = change.content_type {
            self.content_type = content_type;
        }
        if let Some(attributes) = change.attributes {
            self.attributes = attributes;
        }
        if let Some(archived) = change.archived {
            self.archived = archived;
        }
        if let Some(priority) = change.priority {
            self.priority = priority;
        }
        self.revision_n = self.revision_n.saturating_add(1);
        self.last_changed_at = Some(now);
    }

    /// Time of the last accepted edit, or creation if never edited.
    #[must_use]
    pub fn changed_at(&self) -> DateTime<Utc> {
        self.last_changed_at.unwrap_or(self.created_at)
    }

    /// Whether the entry is also shown in descendant logbooks.
    #[must_use]
    pub const fn is_important(&self) -> bool {
        self.priority > PINNED_PRIORITY
    }
}

/// A listed entry with its followup thread folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntrySummary {
    /// The entry.
    pub entry: Entry,
    /// Number of followups to the entry.
    pub n_followups: usize,
    /// Latest change in the entry or any of its followups.
    pub thread_changed_at: DateTime<Utc>,
}
