//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api`; `/health` and the OpenAPI
//! document live at the root.

pub mod client_addr;
pub mod dto;
pub mod handlers;
pub mod openapi;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub use client_addr::ClientAddr;
pub use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", <ApiDoc as utoipa::OpenApi>::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        axum::routing::get(|| async { axum::Json(<ApiDoc as utoipa::OpenApi>::openapi()) }),
    );

    router
}

/// Builds the full application: routes, middleware and state.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// lock owners can be identified by peer address.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router()
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, Bytes};
    use axum::http::{Method, Request, StatusCode};
    use chrono::TimeDelta;
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::api::client_addr::FORWARDED_FOR;
    use crate::api::dto::{EntryListResponse, EntryResponse, LockResponse, LogbookResponse};
    use crate::domain::{EventBus, LogbookRegistry};
    use crate::error::{ConflictReason, ErrorResponse};
    use crate::service::LogbookService;

    fn app() -> Router {
        let service = LogbookService::new(
            Arc::new(LogbookRegistry::new()),
            EventBus::new(),
            TimeDelta::hours(1),
        );
        let state = AppState {
            logbook_service: Arc::new(service),
            trust_forwarded_for: true,
        };
        build_app(state, Duration::from_secs(5))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        client: &str,
        body: Option<Value>,
    ) -> (StatusCode, Bytes) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(FORWARDED_FOR, client)
            .header("content-type", "application/json");
        let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
        let Ok(request) = builder.body(body) else {
            panic!("request should build");
        };
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        (status, bytes)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
        let Ok(value) = serde_json::from_slice(bytes) else {
            panic!("unexpected body: {}", String::from_utf8_lossy(bytes));
        };
        value
    }

    async fn seed(app: &Router) -> (u64, u64) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/logbooks",
            "10.0.0.1",
            Some(json!({"name": "Operations"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let logbook: LogbookResponse = decode(&body);
        let logbook_id = logbook.logbook.id.get();

        let (status, body) = call(
            app,
            Method::POST,
            &format!("/api/logbooks/{logbook_id}/entries"),
            "10.0.0.1",
            Some(json!({"title": "Vacuum leak", "content": "sector 3"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let entry: EntryResponse = decode(&body);
        (logbook_id, entry.entry.id.get())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app();
        let (status, _) = call(&app, Method::GET, "/health", "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn lock_conflict_then_steal() {
        let app = app();
        let (logbook_id, entry_id) = seed(&app).await;
        let lock_uri = format!("/api/logbooks/{logbook_id}/entries/{entry_id}/lock");

        let (status, body) = call(&app, Method::POST, &lock_uri, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let held: LockResponse = decode(&body);
        assert_eq!(held.lock.owned_by_ip, "10.0.0.1");

        let (status, body) = call(&app, Method::POST, &lock_uri, "10.0.0.2", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let conflict: ErrorResponse = decode(&body);
        assert_eq!(conflict.error.reason, Some(ConflictReason::LockHeld));
        assert_eq!(
            conflict.lock.map(|l| l.owned_by_ip).as_deref(),
            Some("10.0.0.1")
        );

        let steal_uri = format!("{lock_uri}?steal=true");
        let (status, body) = call(&app, Method::POST, &steal_uri, "10.0.0.2", None).await;
        assert_eq!(status, StatusCode::OK);
        let stolen: LockResponse = decode(&body);
        assert_eq!(stolen.lock.owned_by_ip, "10.0.0.2");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/logbooks/{logbook_id}/entries/{entry_id}"),
            "10.0.0.1",
            Some(json!({"content": "A's edit", "revision_n": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let refused: ErrorResponse = decode(&body);
        assert_eq!(refused.error.reason, Some(ConflictReason::LockHeld));
    }

    #[tokio::test]
    async fn update_requires_and_checks_revision() {
        let app = app();
        let (logbook_id, entry_id) = seed(&app).await;
        let uri = format!("/api/logbooks/{logbook_id}/entries/{entry_id}/");

        let (status, _) =
            call(&app, Method::PUT, &uri, "10.0.0.1", Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let edit = json!({"title": "x", "revision_n": 0});
        let (status, body) = call(&app, Method::PUT, &uri, "10.0.0.1", Some(edit.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let updated: EntryResponse = decode(&body);
        assert_eq!(updated.entry.revision_n, 1);

        let (status, body) = call(&app, Method::PUT, &uri, "10.0.0.1", Some(edit)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let stale: ErrorResponse = decode(&body);
        assert_eq!(stale.error.reason, Some(ConflictReason::StaleRevision));

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/logbooks/{logbook_id}/entries/{entry_id}/revisions/0"),
            "10.0.0.1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let original: EntryResponse = decode(&body);
        assert_eq!(original.entry.title, "Vacuum leak");
    }

    #[tokio::test]
    async fn owner_cancels_lock_and_check_returns_404() {
        let app = app();
        let (logbook_id, entry_id) = seed(&app).await;
        let lock_uri = format!("/api/logbooks/{logbook_id}/entries/{entry_id}/lock");

        let (status, _) = call(&app, Method::GET, &lock_uri, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, &lock_uri, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::DELETE, &lock_uri, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let cancelled: LockResponse = decode(&body);
        assert_eq!(cancelled.lock.cancelled_by_ip.as_deref(), Some("10.0.0.1"));

        let (status, _) = call(&app, Method::GET, &lock_uri, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_entries_is_paginated() {
        let app = app();
        let (logbook_id, _) = seed(&app).await;
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/logbooks/{logbook_id}/entries?per_page=10"),
            "10.0.0.1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list: EntryListResponse = decode(&body);
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.pagination.total, 1);
    }

    #[tokio::test]
    async fn followups_are_listed_only_on_request() {
        let app = app();
        let (logbook_id, entry_id) = seed(&app).await;
        let entries = format!("/api/logbooks/{logbook_id}/entries");
        let (status, _) = call(
            &app,
            Method::POST,
            &entries,
            "10.0.0.2",
            Some(json!({"title": "Leak fixed", "follows_id": entry_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, Method::GET, &entries, "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let list: EntryListResponse = decode(&body);
        assert_eq!(list.pagination.total, 1);
        let Some(thread) = list.data.first() else {
            panic!("thread root should be listed");
        };
        assert_eq!(thread.entry.id.get(), entry_id);
        assert_eq!(thread.n_followups, 1);

        let (status, body) =
            call(&app, Method::GET, &format!("{entries}?followups=true"), "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let list: EntryListResponse = decode(&body);
        assert_eq!(list.pagination.total, 2);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = app();
        let (status, body) =
            call(&app, Method::GET, "/api-docs/openapi.json", "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = decode(&body);
        assert!(doc.get("paths").is_some());
    }

    #[tokio::test]
    async fn unknown_logbook_is_404() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/logbooks/99", "10.0.0.1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = decode(&body);
        assert_eq!(error.error.code, 2001);
    }
}
