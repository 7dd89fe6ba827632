//! Edit-lock client.
//!
//! Views that edit an entry drive an [`EditSession`] over an [`EntryApi`]
//! (normally [`HttpEntryApi`]). Sibling views stay in sync through an
//! [`crate::domain::EventBus`] carrying [`crate::domain::LOGBOOK_RELOAD`].

pub mod api;
pub mod error;
pub mod http;
pub mod session;

pub use api::{EntryApi, LockOutcome};
pub use error::{ClientError, ConflictError};
pub use http::HttpEntryApi;
pub use session::{EditSession, LockCheck, LockState, RetryPolicy};
