//! Logbook service: orchestrates entry edits and locks, and emits signals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    ActionSignal, AttributeDef, Entry, EntryChange, EntryId, EntryLock, EntryRecord,
    EntrySummary, EventBus, LockGrant, LockId, Logbook, LogbookId, LogbookRegistry, NewEntry,
    NewLogbook,
};
use crate::error::GatewayError;

/// Changes to a logbook's metadata. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct LogbookChange {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New entry template.
    pub template: Option<String>,
    /// Replacement attribute definitions.
    pub attributes: Option<Vec<AttributeDef>>,
}

/// Which entries [`LogbookService::list_entries`] returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    /// Include archived entries.
    pub include_archived: bool,
    /// List followups as entries of their own, not only thread roots.
    pub followups: bool,
}

/// An entry together with its active edit lock, if any.
#[derive(Debug, Clone)]
pub struct EntryView {
    /// The entry.
    pub entry: Entry,
    /// Active lock at read time.
    pub lock: Option<EntryLock>,
}

/// Orchestration layer for all logbook operations.
///
/// Owns references to [`LogbookRegistry`] for state and an [`EventBus`]
/// for action signals. Every mutation follows the same pattern: validate
/// against the logbook → lock the entry record → check and apply → emit a
/// signal → return the result.
#[derive(Debug, Clone)]
pub struct LogbookService {
    registry: Arc<LogbookRegistry>,
    signals: EventBus<ActionSignal>,
    lock_ttl: TimeDelta,
}

impl LogbookService {
    /// Creates a new `LogbookService`.
    #[must_use]
    pub fn new(
        registry: Arc<LogbookRegistry>,
        signals: EventBus<ActionSignal>,
        lock_ttl: TimeDelta,
    ) -> Self {
        Self {
            registry,
            signals,
            lock_ttl,
        }
    }

    /// Returns a reference to the signal bus.
    #[must_use]
    pub fn signals(&self) -> &EventBus<ActionSignal> {
        &self.signals
    }

    /// Returns a reference to the inner [`LogbookRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<LogbookRegistry> {
        &self.registry
    }

    fn emit(&self, signal: &ActionSignal) {
        let delivery = self.signals.publish_report(signal.topic(), signal);
        if delivery.failed > 0 {
            tracing::warn!(
                topic = signal.topic(),
                subscribers = delivery.subscribers,
                failed = delivery.failed,
                "signal subscribers panicked"
            );
        }
    }

    /// Creates a logbook.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] for an empty name or unknown parent.
    pub async fn create_logbook(&self, new: NewLogbook) -> Result<Logbook, GatewayError> {
        let now = Utc::now();
        let logbook = self.registry.insert_logbook(new, now).await?;
        self.emit(&ActionSignal::NewLogbook {
            logbook_id: logbook.id,
            timestamp: now,
        });
        tracing::info!(logbook_id = %logbook.id, name = %logbook.name, "logbook created");
        Ok(logbook)
    }

    /// Returns a logbook.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LogbookNotFound`] if it does not exist.
    pub async fn get_logbook(&self, id: LogbookId) -> Result<Logbook, GatewayError> {
        self.registry.logbook(id).await
    }

    /// Returns logbooks, optionally only the direct children of `parent`.
    pub async fn list_logbooks(&self, parent: Option<LogbookId>) -> Vec<Logbook> {
        let mut logbooks = self.registry.logbooks().await;
        if let Some(parent) = parent {
            logbooks.retain(|l| l.parent_id == Some(parent));
        }
        logbooks
    }

    /// Updates a logbook's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LogbookNotFound`] if it does not exist and
    /// [`GatewayError::InvalidRequest`] for an empty name.
    pub async fn update_logbook(
        &self,
        id: LogbookId,
        change: LogbookChange,
    ) -> Result<Logbook, GatewayError> {
        let now = Utc::now();
        let logbook = self
            .registry
            .update_logbook(id, |logbook| {
                if let Some(name) = change.name {
                    if name.trim().is_empty() {
                        return Err(GatewayError::InvalidRequest(
                            "logbook name must not be empty".to_string(),
                        ));
                    }
                    logbook.name = name;
                }
                if let Some(description) = change.description {
                    logbook.description = description;
                }
                if let Some(template) = change.template {
                    logbook.template = template;
                }
                if let Some(attributes) = change.attributes {
                    logbook.attributes = attributes;
                }
                logbook.last_changed_at = now;
                Ok(())
            })
            .await?;
        self.emit(&ActionSignal::EditLogbook {
            logbook_id: id,
            timestamp: now,
        });
        Ok(logbook)
    }

    /// Creates an entry in `logbook_id`.
    ///
    /// Attributes are checked against the logbook, and an empty body is
    /// replaced by the logbook's template.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] for an unknown logbook, invalid attributes
    /// or a followup to an entry in another logbook.
    pub async fn create_entry(
        &self,
        logbook_id: LogbookId,
        mut new: NewEntry,
    ) -> Result<Entry, GatewayError> {
        let logbook = self.registry.logbook(logbook_id).await?;
        new.attributes = logbook.check_attributes(&new.attributes)?;
        if new.content.is_empty() {
            new.content.clone_from(&logbook.template);
        }
        let now = Utc::now();
        let entry = self.registry.insert_entry(logbook_id, new, now).await?;
        self.emit(&ActionSignal::NewEntry {
            logbook_id,
            entry_id: entry.id,
            timestamp: now,
        });
        tracing::info!(%logbook_id, entry_id = %entry.id, "entry created");
        Ok(entry)
    }

    async fn entry_in(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Result<Arc<RwLock<EntryRecord>>, GatewayError> {
        let record = self.registry.entry(entry_id).await?;
        if record.read().await.entry.logbook_id != logbook_id {
            return Err(GatewayError::EntryNotFound(entry_id));
        }
        Ok(record)
    }

    /// Returns an entry with its active lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EntryNotFound`] if the entry does not exist
    /// in `logbook_id`.
    pub async fn get_entry(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Result<EntryView, GatewayError> {
        let record = self.entry_in(logbook_id, entry_id).await?;
        let record = record.read().await;
        Ok(EntryView {
            entry: record.entry.clone(),
            lock: record.active_lock(Utc::now()).cloned(),
        })
    }

    /// Returns entries of `logbook_id` and its descendants.
    ///
    /// Important entries of ancestor logbooks are included too. Followups
    /// are counted on the entry they follow and, unless
    /// [`EntryFilter::followups`] is set, not listed themselves. Sorted by
    /// priority, then newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LogbookNotFound`] if the logbook does not
    /// exist.
    pub async fn list_entries(
        &self,
        logbook_id: LogbookId,
        filter: EntryFilter,
    ) -> Result<Vec<EntrySummary>, GatewayError> {
        self.registry.logbook(logbook_id).await?;
        let tree = self.registry.subtree(logbook_id).await;
        let mut scope = self.registry.ancestors(logbook_id).await;
        scope.extend(tree.iter().copied());

        let mut entries = self.registry.entries_in(&scope).await;
        entries.retain(|e| filter.include_archived || !e.archived);

        let mut threads: HashMap<EntryId, (usize, DateTime<Utc>)> = HashMap::new();
        for followup in &entries {
            if let Some(parent) = followup.follows_id {
                let thread = threads.entry(parent).or_insert((0, followup.changed_at()));
                thread.0 += 1;
                thread.1 = thread.1.max(followup.changed_at());
            }
        }

        let mut listed: Vec<EntrySummary> = entries
            .into_iter()
            .filter(|e| tree.contains(&e.logbook_id) || e.is_important())
            .filter(|e| filter.followups || e.follows_id.is_none())
            .map(|entry| {
                let (n_followups, latest) = threads
                    .get(&entry.id)
                    .copied()
                    .unwrap_or((0, entry.changed_at()));
                EntrySummary {
                    thread_changed_at: latest.max(entry.changed_at()),
                    n_followups,
                    entry,
                }
            })
            .collect();
        listed.sort_by(|a, b| {
            b.entry
                .priority
                .cmp(&a.entry.priority)
                .then(b.entry.created_at.cmp(&a.entry.created_at))
                .then(b.entry.id.cmp(&a.entry.id))
        });
        Ok(listed)
    }

    /// Returns revision `revision_n` of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EntryNotFound`] or
    /// [`GatewayError::RevisionNotFound`].
    pub async fn get_revision(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        revision_n: u32,
    ) -> Result<Entry, GatewayError> {
        let record = self.entry_in(logbook_id, entry_id).await?;
        let record = record.read().await;
        record.revision(revision_n).cloned()
    }

    /// Applies an edit submitted by `client`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MissingRevision`] if `change.revision_n` is absent.
    /// - [`GatewayError::Conflict`] if the revision is stale or another
    ///   client holds the lock.
    /// - [`GatewayError::InvalidAttribute`] for attribute values that do not
    ///   match the logbook.
    pub async fn update_entry(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        mut change: EntryChange,
        client: &str,
    ) -> Result<Entry, GatewayError> {
        let logbook = self.registry.logbook(logbook_id).await?;
        if let Some(attributes) = change.attributes.as_ref() {
            change.attributes = Some(logbook.check_attributes(attributes)?);
        }
        let record = self.entry_in(logbook_id, entry_id).await?;
        let now = Utc::now();
        let updated = {
            let mut record = record.write().await;
            match record.apply_update(change, client, now) {
                Ok(entry) => entry.clone(),
                Err(err) => {
                    tracing::warn!(
                        %logbook_id,
                        %entry_id,
                        client,
                        error = %err,
                        "entry update refused"
                    );
                    return Err(err);
                }
            }
        };
        self.emit(&ActionSignal::EditEntry {
            logbook_id,
            entry_id,
            revision_n: updated.revision_n,
            timestamp: now,
        });
        tracing::info!(
            %logbook_id,
            %entry_id,
            revision_n = updated.revision_n,
            client,
            "entry updated"
        );
        Ok(updated)
    }

    /// Returns the active lock on an entry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LockNotFound`] if the entry is not locked.
    pub async fn get_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Result<EntryLock, GatewayError> {
        let record = self.entry_in(logbook_id, entry_id).await?;
        let record = record.read().await;
        record
            .active_lock(Utc::now())
            .cloned()
            .ok_or(GatewayError::LockNotFound(entry_id))
    }

    /// Acquires, or with `steal` forcibly takes over, the edit lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] carrying the other holder's lock
    /// when the entry is locked by someone else and `steal` is not set.
    pub async fn acquire_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        client: &str,
        steal: bool,
    ) -> Result<EntryLock, GatewayError> {
        let record = self.entry_in(logbook_id, entry_id).await?;
        let mut record = record.write().await;
        let (lock, grant) = record.acquire_lock(client, steal, self.lock_ttl, Utc::now())?;
        match grant {
            LockGrant::Acquired => tracing::info!(%entry_id, owner = client, "entry lock acquired"),
            LockGrant::AlreadyHeld => {
                tracing::debug!(%entry_id, owner = client, "entry lock already held");
            }
            LockGrant::Stolen => tracing::warn!(%entry_id, owner = client, "entry lock stolen"),
        }
        Ok(lock)
    }

    /// Cancels the active lock on an entry, or only `lock_id` if given.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LockNotFound`] if the entry is not locked, or
    /// not by `lock_id`.
    pub async fn cancel_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        client: &str,
        lock_id: Option<LockId>,
    ) -> Result<EntryLock, GatewayError> {
        let record = self.entry_in(logbook_id, entry_id).await?;
        let mut record = record.write().await;
        let lock = record.cancel_lock(client, lock_id, Utc::now())?;
        tracing::info!(
            %entry_id,
            owner = %lock.owned_by_ip,
            cancelled_by = client,
            "entry lock cancelled"
        );
        Ok(lock)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::domain::{AttributeType, PINNED_PRIORITY, signal};
    use crate::error::ConflictReason;

    fn make_service() -> LogbookService {
        LogbookService::new(
            Arc::new(LogbookRegistry::new()),
            EventBus::new(),
            TimeDelta::hours(1),
        )
    }

    async fn make_logbook(service: &LogbookService) -> Logbook {
        let Ok(logbook) = service
            .create_logbook(NewLogbook {
                name: "Operations".to_string(),
                template: "<p>template</p>".to_string(),
                attributes: vec![AttributeDef {
                    name: "shift".to_string(),
                    attr_type: AttributeType::Option,
                    required: false,
                    options: vec!["day".to_string()],
                }],
                ..NewLogbook::default()
            })
            .await
        else {
            panic!("logbook creation failed");
        };
        logbook
    }

    async fn make_entry(service: &LogbookService, logbook_id: LogbookId) -> Entry {
        let Ok(entry) = service
            .create_entry(
                logbook_id,
                NewEntry {
                    title: "Vacuum leak".to_string(),
                    ..NewEntry::default()
                },
            )
            .await
        else {
            panic!("entry creation failed");
        };
        entry
    }

    #[tokio::test]
    async fn create_entry_uses_template_and_emits_signal() {
        let service = make_service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = service
            .signals()
            .subscribe_fn(signal::NEW_ENTRY, move |s: &ActionSignal| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(s.logbook_id());
                }
            });

        let logbook = make_logbook(&service).await;
        let entry = make_entry(&service, logbook.id).await;

        assert_eq!(entry.content, "<p>template</p>");
        let seen = seen.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen, vec![logbook.id]);
    }

    #[tokio::test]
    async fn panicking_signal_subscriber_does_not_fail_the_operation() {
        let service = make_service();
        let seen = Arc::new(Mutex::new(0_usize));
        let sink = Arc::clone(&seen);
        let _boom = service
            .signals()
            .subscribe_fn(signal::NEW_LOGBOOK, |_: &ActionSignal| panic!("view crashed"));
        let _counter = service
            .signals()
            .subscribe_fn(signal::NEW_LOGBOOK, move |_: &ActionSignal| {
                if let Ok(mut seen) = sink.lock() {
                    *seen += 1;
                }
            });

        let logbook = make_logbook(&service).await;
        assert_eq!(logbook.name, "Operations");
        assert_eq!(seen.lock().map(|n| *n).unwrap_or_default(), 1);
    }

    #[tokio::test]
    async fn entry_is_scoped_to_its_logbook() {
        let service = make_service();
        let logbook = make_logbook(&service).await;
        let entry = make_entry(&service, logbook.id).await;

        let result = service.get_entry(LogbookId::new(999), entry.id).await;
        assert!(matches!(result, Err(GatewayError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn second_client_sees_conflict_until_steal() {
        let service = make_service();
        let logbook = make_logbook(&service).await;
        let entry = make_entry(&service, logbook.id).await;

        let Ok(a_lock) = service.acquire_lock(logbook.id, entry.id, "a", false).await else {
            panic!("a should lock");
        };
        let conflict = service.acquire_lock(logbook.id, entry.id, "b", false).await;
        assert!(matches!(
            conflict,
            Err(GatewayError::Conflict {
                reason: ConflictReason::LockHeld,
                ..
            })
        ));
        // the conflict did not touch A's lock
        let Ok(current) = service.get_lock(logbook.id, entry.id).await else {
            panic!("lock should exist");
        };
        assert_eq!(current.id, a_lock.id);

        let Ok(b_lock) = service.acquire_lock(logbook.id, entry.id, "b", true).await else {
            panic!("steal should succeed");
        };
        assert_eq!(b_lock.owned_by_ip, "b");

        // A's submit is now refused
        let change = EntryChange {
            title: Some("A's edit".to_string()),
            revision_n: Some(0),
            ..EntryChange::default()
        };
        let refused = service.update_entry(logbook.id, entry.id, change, "a").await;
        assert!(matches!(
            refused,
            Err(GatewayError::Conflict {
                reason: ConflictReason::LockHeld,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn update_checks_attributes() {
        let service = make_service();
        let logbook = make_logbook(&service).await;
        let entry = make_entry(&service, logbook.id).await;

        let Some(attributes) = json!({"colour": "red"}).as_object().cloned() else {
            panic!("object");
        };
        let change = EntryChange {
            attributes: Some(attributes),
            revision_n: Some(0),
            ..EntryChange::default()
        };
        let result = service.update_entry(logbook.id, entry.id, change, "a").await;
        assert!(matches!(result, Err(GatewayError::InvalidAttribute(_))));
    }

    #[tokio::test]
    async fn list_entries_includes_children_and_hides_archived() {
        let service = make_service();
        let root = make_logbook(&service).await;
        let Ok(child) = service
            .create_logbook(NewLogbook {
                parent_id: Some(root.id),
                name: "Vacuum".to_string(),
                ..NewLogbook::default()
            })
            .await
        else {
            panic!("child logbook");
        };
        let first = make_entry(&service, root.id).await;
        let second = make_entry(&service, child.id).await;
        let archive = EntryChange {
            archived: Some(true),
            revision_n: Some(0),
            ..EntryChange::default()
        };
        assert!(service.update_entry(root.id, first.id, archive, "a").await.is_ok());

        let Ok(visible) = service.list_entries(root.id, EntryFilter::default()).await else {
            panic!("list");
        };
        assert_eq!(visible.iter().map(|s| s.entry.id).collect::<Vec<_>>(), vec![second.id]);

        let archived = EntryFilter {
            include_archived: true,
            ..EntryFilter::default()
        };
        let Ok(all) = service.list_entries(root.id, archived).await else {
            panic!("list");
        };
        assert_eq!(all.len(), 2);
        assert_eq!(service.list_logbooks(Some(root.id)).await.len(), 1);
    }

    async fn add_entry(
        service: &LogbookService,
        logbook_id: LogbookId,
        title: &str,
        priority: i32,
        follows_id: Option<EntryId>,
    ) -> Entry {
        let Ok(entry) = service
            .create_entry(
                logbook_id,
                NewEntry {
                    title: title.to_string(),
                    priority,
                    follows_id,
                    ..NewEntry::default()
                },
            )
            .await
        else {
            panic!("entry {title} not created");
        };
        entry
    }

    fn titles(listed: &[EntrySummary]) -> Vec<&str> {
        listed.iter().map(|s| s.entry.title.as_str()).collect()
    }

    #[tokio::test]
    async fn listing_folds_followups_and_puts_pinned_first() {
        let service = make_service();
        let logbook = make_logbook(&service).await;
        let pinned = add_entry(&service, logbook.id, "pinned", PINNED_PRIORITY, None).await;
        let parent = add_entry(&service, logbook.id, "parent", 0, None).await;
        let followup = add_entry(&service, logbook.id, "followup", 0, Some(parent.id)).await;

        let Ok(listed) = service.list_entries(logbook.id, EntryFilter::default()).await else {
            panic!("list");
        };
        assert_eq!(titles(&listed), vec!["pinned", "parent"]);
        let Some(thread) = listed.iter().find(|s| s.entry.id == parent.id) else {
            panic!("parent should be listed");
        };
        assert_eq!(thread.n_followups, 1);
        assert_eq!(thread.thread_changed_at, followup.created_at);
        assert_eq!(
            listed.iter().find(|s| s.entry.id == pinned.id).map(|s| s.n_followups),
            Some(0)
        );

        let with_followups = EntryFilter {
            followups: true,
            ..EntryFilter::default()
        };
        let Ok(all) = service.list_entries(logbook.id, with_followups).await else {
            panic!("list");
        };
        assert_eq!(titles(&all), vec!["pinned", "followup", "parent"]);
    }

    #[tokio::test]
    async fn important_entries_show_in_child_logbooks() {
        let service = make_service();
        let root = make_logbook(&service).await;
        let Ok(child) = service
            .create_logbook(NewLogbook {
                parent_id: Some(root.id),
                name: "Vacuum".to_string(),
                ..NewLogbook::default()
            })
            .await
        else {
            panic!("child logbook");
        };
        add_entry(&service, root.id, "beam off all week", 200, None).await;
        add_entry(&service, root.id, "pinned at top", PINNED_PRIORITY, None).await;
        add_entry(&service, child.id, "pump swapped", 0, None).await;

        let Ok(listed) = service.list_entries(child.id, EntryFilter::default()).await else {
            panic!("list");
        };
        assert_eq!(titles(&listed), vec!["beam off all week", "pump swapped"]);
    }

    #[tokio::test]
    async fn update_logbook_rejects_empty_name() {
        let service = make_service();
        let logbook = make_logbook(&service).await;
        let result = service
            .update_logbook(
                logbook.id,
                LogbookChange {
                    name: Some(String::new()),
                    ..LogbookChange::default()
                },
            )
            .await;
        assert!(result.is_err());
    }
}
