//! Logbook handlers: create, list, get, update.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateLogbookRequest, LogbookListParams, LogbookListResponse, LogbookResponse,
    UpdateLogbookRequest,
};
use crate::app_state::AppState;
use crate::domain::LogbookId;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /logbooks`: Create a logbook.
///
/// # Errors
///
/// Returns [`GatewayError`] for an empty name or unknown parent.
#[utoipa::path(
    post,
    path = "/api/logbooks",
    tag = "Logbooks",
    summary = "Create a logbook",
    description = "Creates a logbook, optionally nested under `parent_id`.",
    request_body = CreateLogbookRequest,
    responses(
        (status = 201, description = "Logbook created", body = LogbookResponse),
        (status = 400, description = "Empty name", body = ErrorResponse),
        (status = 404, description = "Parent logbook not found", body = ErrorResponse),
    )
)]
pub async fn create_logbook(
    State(state): State<AppState>,
    Json(req): Json<CreateLogbookRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let logbook = state.logbook_service.create_logbook(req.into()).await?;
    Ok((StatusCode::CREATED, Json(LogbookResponse { logbook })))
}

/// `GET /logbooks`: List logbooks with pagination and optional parent filter.
#[utoipa::path(
    get,
    path = "/api/logbooks",
    tag = "Logbooks",
    summary = "List logbooks",
    description = "Returns a paginated list of logbooks ordered by id. With `parent`, only its direct children.",
    params(LogbookListParams),
    responses(
        (status = 200, description = "Paginated logbook list", body = LogbookListResponse),
    )
)]
pub async fn list_logbooks(
    State(state): State<AppState>,
    Query(params): Query<LogbookListParams>,
) -> impl IntoResponse {
    let logbooks = state.logbook_service.list_logbooks(params.parent).await;
    let (data, pagination) = params.pagination().paginate(logbooks);
    Json(LogbookListResponse { data, pagination })
}

/// `GET /logbooks/{logbook_id}`: Get a logbook.
///
/// # Errors
///
/// Returns [`GatewayError::LogbookNotFound`] if the logbook does not exist.
#[utoipa::path(
    get,
    path = "/api/logbooks/{logbook_id}",
    tag = "Logbooks",
    summary = "Get a logbook",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
    ),
    responses(
        (status = 200, description = "Logbook details", body = LogbookResponse),
        (status = 404, description = "Logbook not found", body = ErrorResponse),
    )
)]
pub async fn get_logbook(
    State(state): State<AppState>,
    Path(logbook_id): Path<LogbookId>,
) -> Result<impl IntoResponse, GatewayError> {
    let logbook = state.logbook_service.get_logbook(logbook_id).await?;
    Ok(Json(LogbookResponse { logbook }))
}

/// `PUT /logbooks/{logbook_id}`: Update a logbook's metadata.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown logbook or an empty name.
#[utoipa::path(
    put,
    path = "/api/logbooks/{logbook_id}",
    tag = "Logbooks",
    summary = "Update a logbook",
    description = "Replaces the given metadata fields; absent fields are kept.",
    params(
        ("logbook_id" = u64, Path, description = "Logbook id"),
    ),
    request_body = UpdateLogbookRequest,
    responses(
        (status = 200, description = "Updated logbook", body = LogbookResponse),
        (status = 400, description = "Empty name", body = ErrorResponse),
        (status = 404, description = "Logbook not found", body = ErrorResponse),
    )
)]
pub async fn update_logbook(
    State(state): State<AppState>,
    Path(logbook_id): Path<LogbookId>,
    Json(req): Json<UpdateLogbookRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let logbook = state
        .logbook_service
        .update_logbook(logbook_id, req.into())
        .await?;
    Ok(Json(LogbookResponse { logbook }))
}

/// Logbook routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logbooks", post(create_logbook).get(list_logbooks))
        .route("/logbooks/{logbook_id}", get(get_logbook).put(update_logbook))
}
