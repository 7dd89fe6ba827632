//! Edit-lock handlers: check, acquire (optionally stealing), cancel.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::client_addr::ClientAddr;
use crate::api::dto::{AcquireLockParams, CancelLockParams, LockResponse};
use crate::app_state::AppState;
use crate::domain::{EntryId, LogbookId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET .../lock`: Check for an active lock.
///
/// # Errors
///
/// Returns [`GatewayError::LockNotFound`] if the entry is not locked.
#[utoipa::path(
    get,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}/lock",
    tag = "Locks",
    summary = "Check the edit lock",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
    ),
    responses(
        (status = 200, description = "Active lock", body = LockResponse),
        (status = 404, description = "Entry not found or not locked", body = ErrorResponse),
    )
)]
pub async fn get_lock(
    State(state): State<AppState>,
    Path((logbook_id, entry_id)): Path<(LogbookId, EntryId)>,
) -> Result<impl IntoResponse, GatewayError> {
    let lock = state.logbook_service.get_lock(logbook_id, entry_id).await?;
    Ok(Json(LockResponse { lock }))
}

/// `POST .../lock`: Acquire the edit lock.
///
/// # Errors
///
/// Returns [`GatewayError::Conflict`] carrying the holder's lock when
/// another client holds it and `steal` is not set.
#[utoipa::path(
    post,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}/lock",
    tag = "Locks",
    summary = "Acquire the edit lock",
    description = "Returns the caller's lock, creating one if the entry is unlocked. With `steal=true` another client's lock is cancelled and replaced.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
        AcquireLockParams,
    ),
    responses(
        (status = 200, description = "Lock held by the caller", body = LockResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
        (status = 409, description = "Locked by another client", body = ErrorResponse),
    )
)]
pub async fn acquire_lock(
    State(state): State<AppState>,
    Path((logbook_id, entry_id)): Path<(LogbookId, EntryId)>,
    Query(params): Query<AcquireLockParams>,
    client: ClientAddr,
) -> Result<impl IntoResponse, GatewayError> {
    let lock = state
        .logbook_service
        .acquire_lock(logbook_id, entry_id, client.as_str(), params.steal)
        .await?;
    Ok(Json(LockResponse { lock }))
}

/// `DELETE .../lock`: Cancel the active lock.
///
/// # Errors
///
/// Returns [`GatewayError::LockNotFound`] if the entry is not locked, or
/// the active lock is not the one named by `lock_id`.
#[utoipa::path(
    delete,
    path = "/api/logbooks/{logbook_id}/entries/{entry_id}/lock",
    tag = "Locks",
    summary = "Cancel the edit lock",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
        ("entry_id" = u64, Path, description = "Entry id"),
        CancelLockParams,
    ),
    responses(
        (status = 200, description = "The cancelled lock", body = LockResponse),
        (status = 404, description = "Entry not found or not locked", body = ErrorResponse),
    )
)]
pub async fn cancel_lock(
    State(state): State<AppState>,
    Path((logbook_id, entry_id)): Path<(LogbookId, EntryId)>,
    Query(params): Query<CancelLockParams>,
    client: ClientAddr,
) -> Result<impl IntoResponse, GatewayError> {
    let lock = state
        .logbook_service
        .cancel_lock(logbook_id, entry_id, client.as_str(), params.lock_id)
        .await?;
    Ok(Json(LockResponse { lock }))
}

/// Lock routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/logbooks/{logbook_id}/entries/{entry_id}/lock",
        get(get_lock).post(acquire_lock).delete(cancel_lock),
    )
}
