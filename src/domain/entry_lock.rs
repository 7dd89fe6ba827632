//! Advisory edit locks.
//!
//! A lock tells other editors that someone is working on an entry. It is
//! a courtesy, not a guarantee: anyone may steal it explicitly, it expires
//! after a while, and the entry's `revision_n` is what actually protects
//! against lost updates.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EntryId, LockId};

/// An edit lock on one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntryLock {
    /// Lock identifier; a steal always yields a new one.
    pub id: LockId,
    /// Locked entry.
    pub entry_id: EntryId,
    /// Address of the client holding the lock.
    pub owned_by_ip: String,
    /// When the lock was acquired.
    pub created_at: DateTime<Utc>,
    /// When the lock stops being honoured.
    pub expires_at: DateTime<Utc>,
    /// When the lock was cancelled, by submit, release or steal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Who cancelled the lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by_ip: Option<String>,
}

impl EntryLock {
    /// Creates a lock owned by `owner` that expires `ttl` after `now`.
    #[must_use]
    pub fn new(entry_id: EntryId, owner: &str, ttl: TimeDelta, now: DateTime<Utc>) -> Self {
        Self {
            id: LockId::new(),
            entry_id,
            owned_by_ip: owner.to_string(),
            created_at: now,
            expires_at: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            cancelled_at: None,
            cancelled_by_ip: None,
        }
    }

    /// Returns `true` if the lock is neither cancelled nor expired at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.cancelled_at.is_none() && self.expires_at > now
    }

    /// Returns `true` if `client` holds this lock.
    #[must_use]
    pub fn is_owned_by(&self, client: &str) -> bool {
        self.owned_by_ip == client
    }

    /// Marks the lock cancelled by `client`.
    pub fn cancel(&mut self, client: &str, now: DateTime<Utc>) {
        self.cancelled_at = Some(now);
        self.cancelled_by_ip = Some(client.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_is_active_until_expiry() {
        let now = Utc::now();
        let lock = EntryLock::new(EntryId::new(1), "10.0.0.1", TimeDelta::minutes(5), now);
        assert!(lock.is_active(now));
        assert!(lock.is_active(now + TimeDelta::minutes(4)));
        assert!(!lock.is_active(now + TimeDelta::minutes(5)));
    }

    #[test]
    fn cancelled_lock_is_inactive() {
        let now = Utc::now();
        let mut lock = EntryLock::new(EntryId::new(1), "10.0.0.1", TimeDelta::hours(1), now);
        lock.cancel("10.0.0.2", now);
        assert!(!lock.is_active(now));
        assert_eq!(lock.cancelled_by_ip.as_deref(), Some("10.0.0.2"));
        assert!(lock.is_owned_by("10.0.0.1"));
    }

    #[test]
    fn huge_ttl_saturates() {
        let now = Utc::now();
        let lock = EntryLock::new(EntryId::new(1), "a", TimeDelta::MAX, now);
        assert_eq!(lock.expires_at, DateTime::<Utc>::MAX_UTC);
    }
}
