//! Transport seam between an edit session and the logbook server.

use std::future::Future;

use super::ClientError;
use crate::api::dto::EntryResponse;
use crate::domain::{Entry, EntryChange, EntryId, EntryLock, LockId, LogbookId};

/// Result of a lock request the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds this lock.
    Acquired(EntryLock),
    /// Another client holds this lock.
    HeldByOther(EntryLock),
}

/// Entry and lock operations an [`super::EditSession`] needs.
///
/// [`super::HttpEntryApi`] talks to the REST API; tests substitute an
/// in-memory fake.
pub trait EntryApi: Send + Sync + 'static {
    /// Fetches the entry and its active lock.
    fn fetch_entry(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> impl Future<Output = Result<EntryResponse, ClientError>> + Send;

    /// Requests the edit lock, taking it over from another holder when
    /// `steal` is set.
    fn acquire_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        steal: bool,
    ) -> impl Future<Output = Result<LockOutcome, ClientError>> + Send;

    /// Returns the active lock, or `None` if the entry is unlocked.
    fn check_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> impl Future<Output = Result<Option<EntryLock>, ClientError>> + Send;

    /// Cancels lock `lock_id` if it is still the active one. Returns `None`
    /// if it was not.
    fn cancel_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        lock_id: LockId,
    ) -> impl Future<Output = Result<Option<EntryLock>, ClientError>> + Send;

    /// Submits an edit and returns the updated entry.
    fn submit(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        change: &EntryChange,
    ) -> impl Future<Output = Result<Entry, ClientError>> + Send;
}
