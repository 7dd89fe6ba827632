//! Entry DTOs for create, get, update and list operations.
//!
//! Create and update bodies are the domain [`crate::domain::NewEntry`] and
//! [`crate::domain::EntryChange`] types.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams, default_page, default_per_page};
use crate::domain::{Entry, EntryLock, EntrySummary};
use crate::service::{EntryFilter, EntryView};

/// Single entry wrapper returned by create, get and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntryResponse {
    /// The entry.
    pub entry: Entry,
    /// Active edit lock on the entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<EntryLock>,
}

impl From<EntryView> for EntryResponse {
    fn from(view: EntryView) -> Self {
        Self {
            entry: view.entry,
            lock: view.lock,
        }
    }
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        Self { entry, lock: None }
    }
}

/// Query parameters for `GET /logbooks/{logbook_id}/entries`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntryListParams {
    /// Include archived entries.
    #[serde(default)]
    pub archived: bool,
    /// List followups as entries of their own.
    #[serde(default)]
    pub followups: bool,
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl EntryListParams {
    /// Pagination part of the query.
    #[must_use]
    pub const fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Entry selection part of the query.
    #[must_use]
    pub const fn filter(&self) -> EntryFilter {
        EntryFilter {
            include_archived: self.archived,
            followups: self.followups,
        }
    }
}

/// Paginated list response for `GET /logbooks/{logbook_id}/entries`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntryListResponse {
    /// Entries on this page, by priority and then newest first.
    pub data: Vec<EntrySummary>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
