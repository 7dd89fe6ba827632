//! Edit session: the client half of the edit-lock protocol.
//!
//! An [`EditSession`] is created when an entry editor opens. It fetches the
//! entry to learn its `revision_n`, asks the server for the edit lock, and
//! only submits while it believes it holds that lock. The server remains the
//! authority: a submit after the lock was stolen is refused there.
//!
//! ```text
//! Unlocked ──acquire──▶ Acquiring ──200──▶ Held ──submit ok──▶ Unlocked
//!                           │                ▲
//!                           └──409──▶ LockedByOther ──steal──┘
//! ```
//!
//! All operations take `&self`. State sits in a [`Mutex`] that is never held
//! across an `.await`, so a view may [`EditSession::close`] the session while
//! a request is in flight; the late answer is then dropped.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::api::{EntryApi, LockOutcome};
use super::{ClientError, ConflictError};
use crate::config::{ClientConfig, MIN_HEARTBEAT};
use crate::domain::{Entry, EntryChange, EntryId, EntryLock, EventBus, LOGBOOK_RELOAD, LogbookId};
use crate::error::ConflictReason;

/// Client-side view of the edit lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No lock is held or requested.
    Unlocked,
    /// A lock request is in flight.
    Acquiring,
    /// This session holds the lock.
    Held(EntryLock),
    /// Another client holds the lock.
    LockedByOther(EntryLock),
}

impl LockState {
    /// Whether this session holds the lock.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        matches!(self, Self::Held(_))
    }

    /// Lock of the other holder, if any.
    #[must_use]
    pub const fn other_holder(&self) -> Option<&EntryLock> {
        match self {
            Self::LockedByOther(lock) => Some(lock),
            _ => None,
        }
    }
}

/// Result of a lock heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCheck {
    /// The lock is still ours.
    Held,
    /// The lock was stolen, expired or cancelled.
    Lost,
    /// Nothing to check: the session did not hold the lock.
    NotHeld,
}

/// Timeout and retry settings for lock requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Attempts before giving up; at least one is always made.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled after each further one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    lock: LockState,
    entry: Option<Entry>,
    last_error: Option<ClientError>,
    closed: bool,
}

/// Edit-lock state machine for one entry.
#[derive(Debug)]
pub struct EditSession<A> {
    api: A,
    bus: EventBus<LogbookId>,
    logbook_id: LogbookId,
    entry_id: EntryId,
    policy: RetryPolicy,
    heartbeat: Duration,
    state: Mutex<SessionState>,
}

impl<A: EntryApi> EditSession<A> {
    /// Creates an unlocked session for one entry.
    ///
    /// `bus` is the application's bus; a successful submit publishes
    /// [`LOGBOOK_RELOAD`] on it.
    #[must_use]
    pub fn new(api: A, bus: EventBus<LogbookId>, logbook_id: LogbookId, entry_id: EntryId) -> Self {
        Self::from_config(api, bus, &ClientConfig::default(), logbook_id, entry_id)
    }

    /// Creates an unlocked session using the retry and heartbeat settings
    /// of `config`.
    #[must_use]
    pub fn from_config(
        api: A,
        bus: EventBus<LogbookId>,
        config: &ClientConfig,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Self {
        Self {
            api,
            bus,
            logbook_id,
            entry_id,
            policy: RetryPolicy::from(config),
            heartbeat: config.heartbeat.max(MIN_HEARTBEAT),
            state: Mutex::new(SessionState {
                lock: LockState::Unlocked,
                entry: None,
                last_error: None,
                closed: false,
            }),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy used for lock requests.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Interval used by [`EditSession::start_heartbeat`].
    #[must_use]
    pub const fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lock state.
    #[must_use]
    pub fn lock_state(&self) -> LockState {
        self.state().lock.clone()
    }

    /// Entry as last fetched or submitted.
    #[must_use]
    pub fn entry(&self) -> Option<Entry> {
        self.state().entry.clone()
    }

    /// Last error any operation ran into, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<ClientError> {
        self.state().last_error.clone()
    }

    /// Whether [`EditSession::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Marks the session closed. Answers to requests still in flight are
    /// discarded and leave the state untouched.
    pub fn close(&self) {
        let mut state = self.state();
        if !state.closed {
            state.closed = true;
            tracing::debug!(entry_id = %self.entry_id, "edit session closed");
        }
    }

    /// Locks the state for an update, unless the session is closed.
    fn live_state(&self, what: &str) -> Result<MutexGuard<'_, SessionState>, ClientError> {
        let state = self.state();
        if state.closed {
            tracing::debug!(
                entry_id = %self.entry_id,
                what,
                "discarding answer for closed session"
            );
            return Err(ClientError::Closed);
        }
        Ok(state)
    }

    /// Runs `op` under the request timeout, retrying transport failures
    /// with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut delay = self.policy.base_delay;
        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(self.policy.timeout, op())
                .await
                .unwrap_or(Err(ClientError::Timeout));
            match result {
                Err(err)
                    if err.is_retryable()
                        && attempt < self.policy.max_attempts
                        && !self.is_closed() =>
                {
                    tracing::debug!(
                        entry_id = %self.entry_id,
                        what,
                        attempt,
                        error = %err,
                        "retrying lock request"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn once<T, Fut>(&self, op: Fut) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        tokio::time::timeout(self.policy.timeout, op)
            .await
            .unwrap_or(Err(ClientError::Timeout))
    }

    /// Fetches the entry, records its revision, then acquires the lock.
    ///
    /// # Errors
    ///
    /// Returns the fetch error (after retries) or whatever
    /// [`EditSession::acquire`] returns.
    pub async fn open(&self) -> Result<LockState, ClientError> {
        self.live_state("open")?;
        let fetched = self
            .with_retry("fetch entry", || self.api.fetch_entry(self.logbook_id, self.entry_id))
            .await;
        {
            let mut state = self.live_state("fetch entry")?;
            match fetched {
                Ok(response) => {
                    state.entry = Some(response.entry);
                    state.last_error = None;
                }
                Err(err) => {
                    state.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        }
        self.acquire().await
    }

    /// Asks the server for the edit lock.
    ///
    /// Ends in [`LockState::Held`] or, if someone else holds it,
    /// [`LockState::LockedByOther`] carrying their lock.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] or [`ClientError::Timeout`] once all
    /// attempts failed; the state is then back to [`LockState::Unlocked`].
    /// Returns [`ClientError::Closed`] if the session was closed.
    pub async fn acquire(&self) -> Result<LockState, ClientError> {
        self.live_state("acquire")?.lock = LockState::Acquiring;
        let result = self
            .with_retry("acquire lock", || {
                self.api.acquire_lock(self.logbook_id, self.entry_id, false)
            })
            .await;

        let mut state = self.live_state("acquire lock")?;
        match result {
            Ok(LockOutcome::Acquired(lock)) => {
                tracing::info!(entry_id = %self.entry_id, lock_id = %lock.id, "edit lock acquired");
                state.lock = LockState::Held(lock);
                state.last_error = None;
            }
            Ok(LockOutcome::HeldByOther(lock)) => {
                tracing::info!(
                    entry_id = %self.entry_id,
                    owner = %lock.owned_by_ip,
                    "entry locked by another client"
                );
                state.lock = LockState::LockedByOther(lock);
                state.last_error = None;
            }
            Err(err) => {
                tracing::warn!(entry_id = %self.entry_id, error = %err, "lock request failed");
                state.lock = LockState::Unlocked;
                state.last_error = Some(err.clone());
                return Err(err);
            }
        }
        Ok(state.lock.clone())
    }

    /// Takes the lock over from its current holder.
    ///
    /// Only meaningful in [`LockState::LockedByOther`]; in any other state
    /// nothing is sent and `Ok(false)` is returned. The previous holder is
    /// not told.
    ///
    /// # Errors
    ///
    /// Returns the request error. A [`ClientError::Conflict`] means someone
    /// else won the race; the state then shows the new holder and stealing
    /// may be retried.
    pub async fn steal(&self) -> Result<bool, ClientError> {
        let previous = {
            let mut state = self.live_state("steal")?;
            let LockState::LockedByOther(previous) = state.lock.clone() else {
                return Ok(false);
            };
            state.lock = LockState::Acquiring;
            previous
        };
        let result = self
            .with_retry("steal lock", || {
                self.api.acquire_lock(self.logbook_id, self.entry_id, true)
            })
            .await;

        let mut state = self.live_state("steal lock")?;
        match result {
            Ok(LockOutcome::Acquired(lock)) => {
                tracing::warn!(
                    entry_id = %self.entry_id,
                    previous_owner = %previous.owned_by_ip,
                    lock_id = %lock.id,
                    "edit lock stolen"
                );
                state.lock = LockState::Held(lock);
                state.last_error = None;
                Ok(true)
            }
            Ok(LockOutcome::HeldByOther(lock)) => {
                let err = ClientError::Conflict(ConflictError {
                    reason: ConflictReason::LockHeld,
                    message: format!("entry {} is locked by {}", self.entry_id, lock.owned_by_ip),
                    lock: Some(lock.clone()),
                });
                state.lock = LockState::LockedByOther(lock);
                state.last_error = Some(err.clone());
                Err(err)
            }
            Err(err) => {
                let holder = err
                    .conflict()
                    .and_then(|c| c.lock.clone())
                    .unwrap_or(previous);
                state.lock = LockState::LockedByOther(holder);
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Submits `draft` based on the revision recorded at fetch time.
    ///
    /// Only sent in [`LockState::Held`]; otherwise `Ok(None)` and no
    /// request. On success the session is unlocked (the server released the
    /// lock), [`LOGBOOK_RELOAD`] is published with the entry's logbook, and
    /// the updated entry is returned for navigation. Submits are never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns the server's refusal (stale revision, lock held elsewhere,
    /// validation) or a transport error. The lock state is left as it was.
    pub async fn submit(&self, mut draft: EntryChange) -> Result<Option<Entry>, ClientError> {
        {
            let state = self.live_state("submit")?;
            if !state.lock.is_held() {
                return Ok(None);
            }
            draft.revision_n = state.entry.as_ref().map(|e| e.revision_n);
        }
        let result = self
            .once(self.api.submit(self.logbook_id, self.entry_id, &draft))
            .await;

        let updated = {
            let mut state = self.live_state("submit")?;
            match result {
                Ok(entry) => {
                    state.entry = Some(entry.clone());
                    state.lock = LockState::Unlocked;
                    state.last_error = None;
                    entry
                }
                Err(err) => {
                    tracing::warn!(entry_id = %self.entry_id, error = %err, "submit refused");
                    state.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        };
        tracing::info!(
            logbook_id = %updated.logbook_id,
            entry_id = %updated.id,
            revision_n = updated.revision_n,
            "entry submitted"
        );
        if !self.bus.publish(LOGBOOK_RELOAD, &updated.logbook_id) {
            tracing::debug!(logbook_id = %updated.logbook_id, "no view listening for reloads");
        }
        Ok(Some(updated))
    }

    /// Checks with the server that the held lock is still ours.
    ///
    /// A lock taken over by someone else moves the session to
    /// [`LockState::LockedByOther`]; an expired or cancelled one to
    /// [`LockState::Unlocked`].
    ///
    /// # Errors
    ///
    /// Returns the request error; the state is left as it was.
    pub async fn refresh_lock(&self) -> Result<LockCheck, ClientError> {
        let held_id = match &self.live_state("refresh lock")?.lock {
            LockState::Held(lock) => lock.id,
            _ => return Ok(LockCheck::NotHeld),
        };
        let result = self
            .once(self.api.check_lock(self.logbook_id, self.entry_id))
            .await;

        let mut state = self.live_state("refresh lock")?;
        // a submit or release may have finished while we waited
        if !matches!(&state.lock, LockState::Held(lock) if lock.id == held_id) {
            return Ok(LockCheck::NotHeld);
        }
        match result {
            Ok(Some(lock)) if lock.id == held_id => {
                state.lock = LockState::Held(lock);
                Ok(LockCheck::Held)
            }
            Ok(Some(lock)) => {
                tracing::warn!(
                    entry_id = %self.entry_id,
                    owner = %lock.owned_by_ip,
                    "edit lock taken over"
                );
                state.lock = LockState::LockedByOther(lock);
                Ok(LockCheck::Lost)
            }
            Ok(None) => {
                tracing::warn!(entry_id = %self.entry_id, "edit lock expired or cancelled");
                state.lock = LockState::Unlocked;
                Ok(LockCheck::Lost)
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Cancels the held lock when leaving without submitting.
    ///
    /// Returns `Ok(false)` without a request when nothing is held, and also
    /// when the lock had already been replaced on the server.
    ///
    /// # Errors
    ///
    /// Returns the request error; the state is left as it was.
    pub async fn release(&self) -> Result<bool, ClientError> {
        let held_id = match &self.live_state("release")?.lock {
            LockState::Held(lock) => lock.id,
            _ => return Ok(false),
        };
        let result = self
            .once(self.api.cancel_lock(self.logbook_id, self.entry_id, held_id))
            .await;

        let mut state = self.live_state("release")?;
        match result {
            Ok(cancelled) => {
                tracing::info!(entry_id = %self.entry_id, lock_id = %held_id, "edit lock released");
                state.lock = LockState::Unlocked;
                state.last_error = None;
                Ok(cancelled.is_some())
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}

impl<A: EntryApi> EditSession<A> {
    /// Starts the heartbeat at the configured interval.
    pub fn start_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        self.spawn_heartbeat(self.heartbeat)
    }

    /// Calls [`EditSession::refresh_lock`] every `every` until the session
    /// is closed or dropped. Intervals below [`MIN_HEARTBEAT`] are raised
    /// to it.
    pub fn spawn_heartbeat(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = every.max(MIN_HEARTBEAT);
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                match session.refresh_lock().await {
                    Ok(LockCheck::Lost) => {
                        tracing::info!(entry_id = %session.entry_id, "heartbeat noticed lost lock");
                    }
                    Ok(LockCheck::Held | LockCheck::NotHeld) => {}
                    Err(ClientError::Closed) => break,
                    Err(err) => {
                        tracing::debug!(
                            entry_id = %session.entry_id,
                            error = %err,
                            "heartbeat failed"
                        );
                    }
                }
            }
        })
    }
}
