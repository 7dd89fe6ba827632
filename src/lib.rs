//! # logbook-gateway
//!
//! REST gateway and edit-lock client for a nested electronic logbook.
//!
//! The server half stores logbooks, entries with their revision history,
//! and advisory edit locks. The client half implements the edit-lock
//! protocol an entry editor follows: fetch, lock (or see who holds it),
//! optionally steal, submit against the fetched revision, and announce the
//! change to sibling views over an in-process event bus.
//!
//! ## Architecture
//!
//! ```text
//! Views ── EventBus<LogbookId> ("logbook.reload")
//!   │
//!   └── EditSession (client/) ── HttpEntryApi (reqwest)
//!                                     │
//!                          REST Handlers (api/)
//!                                     │
//!                          LogbookService (service/) ── EventBus<ActionSignal>
//!                                     │
//!                          LogbookRegistry (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
