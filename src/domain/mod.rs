//! Domain layer: core types, logbook registry, and event system.
//!
//! This module contains the server-side domain model: identifiers,
//! logbooks with typed attributes, entries with their revision and lock
//! history, the topic-based event bus, and the registry that stores it all.

pub mod entry;
pub mod entry_lock;
pub mod entry_record;
pub mod event_bus;
pub mod ids;
pub mod logbook;
pub mod logbook_registry;
pub mod signal;

pub use entry::{Author, Entry, EntryChange, EntrySummary, NewEntry, PINNED_PRIORITY};
pub use entry_lock::EntryLock;
pub use entry_record::{EntryRecord, LockGrant};
pub use event_bus::{Callback, Delivery, EventBus, LOGBOOK_RELOAD, Subscription};
pub use ids::{EntryId, LockId, LogbookId};
pub use logbook::{AttributeDef, AttributeType, Logbook};
pub use logbook_registry::{LogbookRegistry, NewLogbook};
pub use signal::ActionSignal;
