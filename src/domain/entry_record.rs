//! Per-entry aggregate: current entry, revision history and the latest
//! edit lock.
//!
//! All lock and revision checks for one entry run against a single
//! [`EntryRecord`] under its write lock, so check-then-act is atomic per
//! request.

use chrono::{DateTime, TimeDelta, Utc};

use super::{Entry, EntryChange, EntryLock, LockId};
use crate::error::GatewayError;

/// How a lock request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockGrant {
    /// No active lock existed; a new one was created.
    Acquired,
    /// The caller already held the active lock.
    AlreadyHeld,
    /// Another client's lock was cancelled in favour of the caller.
    Stolen,
}

/// Entry plus everything the server remembers about its history.
#[derive(Debug)]
pub struct EntryRecord {
    /// Current state of the entry.
    pub entry: Entry,
    /// `revisions[n]` is the entry as it was at `revision_n == n`.
    revisions: Vec<Entry>,
    /// Most recent lock. Only the latest lock can be active, so older ones
    /// are dropped when it is replaced.
    lock: Option<EntryLock>,
}

impl EntryRecord {
    /// Wraps a freshly created entry.
    #[must_use]
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            revisions: Vec::new(),
            lock: None,
        }
    }

    /// Returns the active lock at `now`, if any.
    #[must_use]
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&EntryLock> {
        self.lock.as_ref().filter(|l| l.is_active(now))
    }

    /// Returns the most recent lock, even if cancelled or expired.
    #[must_use]
    pub const fn last_lock(&self) -> Option<&EntryLock> {
        self.lock.as_ref()
    }

    fn active_lock_mut(&mut self, now: DateTime<Utc>) -> Option<&mut EntryLock> {
        self.lock.as_mut().filter(|l| l.is_active(now))
    }

    /// Acquires the edit lock for `client`.
    ///
    /// An active lock owned by `client` is returned unchanged. One owned by
    /// someone else is a conflict unless `steal` is set, in which case it is
    /// cancelled and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] with
    /// [`crate::error::ConflictReason::LockHeld`] when another client holds
    /// the lock and `steal` is `false`.
    pub fn acquire_lock(
        &mut self,
        client: &str,
        steal: bool,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<(EntryLock, LockGrant), GatewayError> {
        let entry_id = self.entry.id;
        let grant = match self.active_lock_mut(now) {
            Some(lock) if lock.is_owned_by(client) => {
                return Ok((lock.clone(), LockGrant::AlreadyHeld));
            }
            Some(lock) if steal => {
                lock.cancel(client, now);
                LockGrant::Stolen
            }
            Some(lock) => return Err(GatewayError::locked(lock)),
            None => LockGrant::Acquired,
        };
        let lock = EntryLock::new(entry_id, client, ttl, now);
        self.lock = Some(lock.clone());
        Ok((lock, grant))
    }

    /// Cancels the active lock on behalf of `client`.
    ///
    /// With `lock_id`, only that lock is cancelled, so a client cannot
    /// cancel a lock that replaced its own.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LockNotFound`] if there is no active lock, or
    /// the active lock is not `lock_id`.
    pub fn cancel_lock(
        &mut self,
        client: &str,
        lock_id: Option<LockId>,
        now: DateTime<Utc>,
    ) -> Result<EntryLock, GatewayError> {
        let entry_id = self.entry.id;
        let lock = self
            .active_lock_mut(now)
            .filter(|lock| lock_id.is_none_or(|id| lock.id == id))
            .ok_or(GatewayError::LockNotFound(entry_id))?;
        lock.cancel(client, now);
        Ok(lock.clone())
    }

    /// Applies `change` on behalf of `client`.
    ///
    /// The change must name the revision it was based on, and that revision
    /// must still be current. An active lock held by someone else refuses
    /// the write; the caller's own lock is released by it. Attribute values
    /// must already have been checked.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MissingRevision`] if `change.revision_n` is absent.
    /// - [`GatewayError::Conflict`] with `StaleRevision` or `LockHeld`.
    pub fn apply_update(
        &mut self,
        change: EntryChange,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<&Entry, GatewayError> {
        let entry_id = self.entry.id;
        let sent = change.revision_n.ok_or(GatewayError::MissingRevision)?;
        if sent != self.entry.revision_n {
            return Err(GatewayError::stale_revision(entry_id, sent, self.entry.revision_n));
        }
        if let Some(lock) = self.active_lock_mut(now) {
            if !lock.is_owned_by(client) {
                return Err(GatewayError::locked(lock));
            }
            lock.cancel(client, now);
        }
        self.revisions.push(self.entry.clone());
        self.entry.apply(change, now);
        Ok(&self.entry)
    }

    /// Returns the entry as it was at revision `n`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RevisionNotFound`] for revisions beyond the
    /// current one.
    pub fn revision(&self, n: u32) -> Result<&Entry, GatewayError> {
        if n == self.entry.revision_n {
            return Ok(&self.entry);
        }
        usize::try_from(n)
            .ok()
            .and_then(|i| self.revisions.get(i))
            .ok_or(GatewayError::RevisionNotFound {
                entry_id: self.entry.id,
                revision_n: n,
            })
    }
}
