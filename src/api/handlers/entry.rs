//! Entry handlers: create, list, get, update, and old revisions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::client_addr::ClientAddr;
use crate::api::dto::{EntryListParams, EntryListResponse, EntryResponse};
use crate::app_state::AppState;
use crate::domain::{EntryChange, EntryId, LogbookId, NewEntry};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /logbooks/{logbook_id}/entries`: Create an entry.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown logbook, invalid attributes or a
/// followup to an entry in another logbook.
#[utoipa::path(
    post,
    path = "/api/logbooks/{logbook_id}/entries",
    tag = "Entries",
    summary = "Create an entry",
    description = "Creates an entry. An empty `content` is replaced by the logbook template.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
    ),
    request_body = NewEntry,
    responses(
        (status = 201, description = "Entry created", body = EntryResponse),
        (status = 400, description = "Invalid followup", body = ErrorResponse),
        (status = 404, description = "Logbook not found", body = ErrorResponse),
        (status = 422, description = "Invalid attribute", body = ErrorResponse),
    )
)]
pub async fn create_entry(
    State(state): State<AppState>,
    Path(logbook_id): Path<LogbookId>,
    Json(req): Json<NewEntry>,
) -> Result<impl IntoResponse, GatewayError> {
    let entry = state.logbook_service.create_entry(logbook_id, req).await?;
    Ok((StatusCode::CREATED, Json(EntryResponse::from(entry))))
}

/// `GET /logbooks/{logbook_id}/entries`: List entries of a logbook subtree.
///
/// # Errors
///
/// Returns [`GatewayError::LogbookNotFound`] if the logbook does not exist.
#[utoipa::path(
    get,
    path = "/api/logbooks/{logbook_id}/entries",
    tag = "Entries",
    summary = "List entries",
    description = "Returns entries of the logbook and all logbooks below it, plus important entries (priority above 100) of the logbooks above it. Followups are counted on their parent and only listed with `followups=true`. Sorted by priority, then newest first. Archived entries are only included with `archived=true`.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        EntryListParams,
    ),
    responses(
        (status = 200, description = "Paginated entry list", body = EntryListResponse),
        (status = 404, description = "Logbook not found", body = ErrorResponse),
    )
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Path(logbook_id): Path<LogbookId>,
    Query(params): Query<EntryListParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let entries = state
        .logbook_service
        .list_entries(logbook_id, params.filter())
        .await?;
    let (data, pagination) = params.pagination().paginate(entries);
    Ok(Json(EntryListResponse { data, pagination }))
}

/// `GET /logbooks/{logbook_id}/entries/{entry_id}`: Get an entry.
///
/// # Errors
///
/// Returns [`GatewayError::EntryNotFound`] if the entry is not in the logbook.
#[utoipa::path(
    get,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}",
    tag = "Entries",
    summary = "Get an entry",
    description = "Returns the current entry together with its active edit lock, if any.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
    ),
    responses(
        (status = 200, description = "Entry details", body = EntryResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
    )
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Path((logbook_id, entry_id)): Path<(LogbookId, EntryId)>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.logbook_service.get_entry(logbook_id, entry_id).await?;
    Ok(Json(EntryResponse::from(view)))
}

/// `PUT /logbooks/{logbook_id}/entries/{entry_id}`: Submit an edit.
///
/// # Errors
///
/// - [`GatewayError::MissingRevision`] without `revision_n`.
/// - [`GatewayError::Conflict`] for a stale revision or a lock held by
///   another client.
#[utoipa::path(
    put,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}",
    tag = "Entries",
    summary = "Update an entry",
    description = "Applies an edit based on `revision_n`. Refused while another client holds the edit lock; the caller's own lock is released.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
    ),
    request_body = EntryChange,
    responses(
        (status = 200, description = "Updated entry", body = EntryResponse),
        (status = 400, description = "Missing revision_n", body = ErrorResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
        (status = 409, description = "Locked by another client or stale revision", body = ErrorResponse),
        (status = 422, description = "Invalid attribute", body = ErrorResponse),
    )
)]
pub async fn update_entry(
    State(state): State<AppState>,
    Path((logbook_id, entry_id)): Path<(LogbookId, EntryId)>,
    client: ClientAddr,
    Json(change): Json<EntryChange>,
) -> Result<impl IntoResponse, GatewayError> {
    let entry = state
        .logbook_service
        .update_entry(logbook_id, entry_id, change, client.as_str())
        .await?;
    Ok(Json(EntryResponse::from(entry)))
}

/// `GET /logbooks/{logbook_id}/entries/{entry_id}/revisions/{revision_n}`:
/// Get an older revision of an entry.
///
/// # Errors
///
/// Returns [`GatewayError::RevisionNotFound`] for revisions that do not
/// exist.
#[utoipa::path(
    get,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}/revisions/{revision_n}",
    tag = "Entries",
    summary = "Get an entry revision",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
        ("revision_n" = u32, Path, description = "Revision number"),
    ),
    responses(
        (status = 200, description = "Entry as of the revision", body = EntryResponse),
        (status = 404, description = "Entry or revision not found", body = ErrorResponse),
    )
)]
pub async fn get_revision(
    State(state): State<AppState>,
    Path((logbook_id, entry_id, revision_n)): Path<(LogbookId, EntryId, u32)>,
) -> Result<impl IntoResponse, GatewayError> {
    let entry = state
        .logbook_service
        .get_revision(logbook_id, entry_id, revision_n)
        .await?;
    Ok(Json(EntryResponse::from(entry)))
}

/// Entry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/logbooks/{logbook_id}/entries",
            get(list_entries).post(create_entry),
        )
        .route(
            "/logbooks/{logbook_id}/entries/{entry_id}",
            get(get_entry).put(update_entry),
        )
        .route(
            "/logbooks/{logbook_id}/entries/{entry_id}/",
            get(get_entry).put(update_entry),
        )
        .route(
            "/logbooks/{logbook_id}/entries/{entry_id}/revisions/{revision_n}",
            get(get_revision),
        )
}
