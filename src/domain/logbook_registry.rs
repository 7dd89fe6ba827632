//! Concurrent logbook and entry storage with per-entry locking.
//!
//! [`LogbookRegistry`] keeps logbooks in one map and entries in another,
//! where each entry record is individually protected by a
//! [`tokio::sync::RwLock`]. Lock and revision checks on one entry are
//! serialized; work on different entries proceeds concurrently.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::entry_record::EntryRecord;
use super::{AttributeDef, Entry, EntryId, Logbook, LogbookId, NewEntry};
use crate::error::GatewayError;

/// Fields supplied when creating a logbook.
#[derive(Debug, Clone, Default)]
pub struct NewLogbook {
    /// Parent in the logbook tree.
    pub parent_id: Option<LogbookId>,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Content pre-filled into new entries.
    pub template: String,
    /// Attribute definitions.
    pub attributes: Vec<AttributeDef>,
}

/// Central store for logbooks and entries.
///
/// # Concurrency
///
/// - Multiple tasks may read the same entry concurrently.
/// - Writes to different entries are concurrent.
/// - Writes to the same entry (edits, lock changes) are serialized.
#[derive(Debug)]
pub struct LogbookRegistry {
    logbooks: RwLock<BTreeMap<LogbookId, Logbook>>,
    entries: RwLock<BTreeMap<EntryId, Arc<RwLock<EntryRecord>>>>,
    next_logbook_id: AtomicU64,
    next_entry_id: AtomicU64,
}

impl LogbookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logbooks: RwLock::new(BTreeMap::new()),
            entries: RwLock::new(BTreeMap::new()),
            next_logbook_id: AtomicU64::new(1),
            next_entry_id: AtomicU64::new(1),
        }
    }

    /// Creates a logbook and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an empty name and
    /// [`GatewayError::LogbookNotFound`] for an unknown parent.
    pub async fn insert_logbook(
        &self,
        new: NewLogbook,
        now: DateTime<Utc>,
    ) -> Result<Logbook, GatewayError> {
        if new.name.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("logbook name must not be empty".to_string()));
        }
        let mut map = self.logbooks.write().await;
        if let Some(parent) = new.parent_id
            && !map.contains_key(&parent)
        {
            return Err(GatewayError::LogbookNotFound(parent));
        }
        let id = LogbookId::new(self.next_logbook_id.fetch_add(1, Ordering::Relaxed));
        let logbook = Logbook {
            id,
            parent_id: new.parent_id,
            name: new.name,
            description: new.description,
            template: new.template,
            attributes: new.attributes,
            created_at: now,
            last_changed_at: now,
        };
        map.insert(id, logbook.clone());
        Ok(logbook)
    }

    /// Returns a copy of the logbook.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LogbookNotFound`] if it does not exist.
    pub async fn logbook(&self, id: LogbookId) -> Result<Logbook, GatewayError> {
        self.logbooks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(GatewayError::LogbookNotFound(id))
    }

    /// Runs `update` on the stored logbook and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LogbookNotFound`] if it does not exist, or
    /// whatever `update` returns.
    pub async fn update_logbook<F>(&self, id: LogbookId, update: F) -> Result<Logbook, GatewayError>
    where
        F: FnOnce(&mut Logbook) -> Result<(), GatewayError>,
    {
        let mut map = self.logbooks.write().await;
        let logbook = map.get_mut(&id).ok_or(GatewayError::LogbookNotFound(id))?;
        let mut draft = logbook.clone();
        update(&mut draft)?;
        *logbook = draft;
        Ok(logbook.clone())
    }

    /// Returns all logbooks ordered by id.
    pub async fn logbooks(&self) -> Vec<Logbook> {
        self.logbooks.read().await.values().cloned().collect()
    }

    /// Returns `root` and the ids of all logbooks below it.
    pub async fn subtree(&self, root: LogbookId) -> HashSet<LogbookId> {
        let map = self.logbooks.read().await;
        let mut found = HashSet::from([root]);
        // parents always have lower ids than their children
        for logbook in map.values() {
            if let Some(parent) = logbook.parent_id
                && found.contains(&parent)
            {
                found.insert(logbook.id);
            }
        }
        found
    }

    /// Returns the ids of the logbooks above `id`.
    pub async fn ancestors(&self, id: LogbookId) -> HashSet<LogbookId> {
        let map = self.logbooks.read().await;
        let mut found = HashSet::new();
        let mut current = map.get(&id).and_then(|l| l.parent_id);
        while let Some(parent) = current {
            if !found.insert(parent) {
                break;
            }
            current = map.get(&parent).and_then(|l| l.parent_id);
        }
        found
    }

    /// Stores a new entry in `logbook_id` and returns it.
    ///
    /// Attribute values must already have been checked by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `follows_id` names an
    /// entry in a different logbook, or [`GatewayError::EntryNotFound`] if
    /// it names no entry at all.
    pub async fn insert_entry(
        &self,
        logbook_id: LogbookId,
        new: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<Entry, GatewayError> {
        let mut map = self.entries.write().await;
        if let Some(parent_id) = new.follows_id {
            let parent = map.get(&parent_id).ok_or(GatewayError::EntryNotFound(parent_id))?;
            if parent.read().await.entry.logbook_id != logbook_id {
                return Err(GatewayError::InvalidRequest(format!(
                    "entry {parent_id} belongs to another logbook"
                )));
            }
        }
        let id = EntryId::new(self.next_entry_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry {
            id,
            logbook_id,
            title: new.title,
            authors: new.authors,
            content: new.content,
            content_type: new.content_type,
            attributes: new.attributes,
            follows_id: new.follows_id,
            archived: false,
            priority: new.priority,
            revision_n: 0,
            created_at: now,
            last_changed_at: None,
        };
        map.insert(id, Arc::new(RwLock::new(EntryRecord::new(entry.clone()))));
        Ok(entry)
    }

    /// Returns the entry record behind its per-entry lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EntryNotFound`] if no entry with the given
    /// ID exists.
    pub async fn entry(&self, id: EntryId) -> Result<Arc<RwLock<EntryRecord>>, GatewayError> {
        let map = self.entries.read().await;
        map.get(&id).cloned().ok_or(GatewayError::EntryNotFound(id))
    }

    /// Returns copies of all entries whose logbook is in `logbooks`.
    pub async fn entries_in(&self, logbooks: &HashSet<LogbookId>) -> Vec<Entry> {
        let map = self.entries.read().await;
        let mut found = Vec::new();
        for record in map.values() {
            let record = record.read().await;
            if logbooks.contains(&record.entry.logbook_id) {
                found.push(record.entry.clone());
            }
        }
        found
    }

    /// Returns the number of stored entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for LogbookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
