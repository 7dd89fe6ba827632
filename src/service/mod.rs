//! Service layer: business logic orchestration.
//!
//! [`LogbookService`] coordinates logbook and entry operations, enforces the
//! edit-lock and revision rules, and emits signals through the
//! [`super::domain::EventBus`].

pub mod logbook_service;

pub use logbook_service::{EntryFilter, EntryView, LogbookChange, LogbookService};
