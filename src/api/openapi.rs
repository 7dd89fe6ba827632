//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    CreateLogbookRequest, EntryListResponse, EntryResponse, LockResponse, LogbookListResponse,
    LogbookResponse, PaginationMeta, UpdateLogbookRequest,
};
use crate::api::handlers::{entry, lock, logbook, system};
use crate::domain::{
    AttributeDef, AttributeType, Author, Entry, EntryChange, EntryId, EntryLock, EntrySummary,
    LockId, Logbook, LogbookId, NewEntry,
};
use crate::error::{ConflictReason, ErrorBody, ErrorResponse};

/// Generated OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "logbook-gateway",
        description = "Nested electronic logbook with advisory edit locks."
    ),
    paths(
        system::health_handler,
        logbook::create_logbook,
        logbook::list_logbooks,
        logbook::get_logbook,
        logbook::update_logbook,
        entry::create_entry,
        entry::list_entries,
        entry::get_entry,
        entry::update_entry,
        entry::get_revision,
        lock::get_lock,
        lock::acquire_lock,
        lock::cancel_lock,
    ),
    components(schemas(
        system::HealthResponse,
        CreateLogbookRequest,
        UpdateLogbookRequest,
        LogbookResponse,
        LogbookListResponse,
        EntryResponse,
        EntryListResponse,
        LockResponse,
        PaginationMeta,
        Logbook,
        LogbookId,
        AttributeDef,
        AttributeType,
        Entry,
        EntrySummary,
        EntryId,
        NewEntry,
        EntryChange,
        Author,
        EntryLock,
        LockId,
        ErrorResponse,
        ErrorBody,
        ConflictReason,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Logbooks", description = "Logbook tree"),
        (name = "Entries", description = "Entries and revisions"),
        (name = "Locks", description = "Advisory edit locks"),
    )
)]
pub struct ApiDoc;
