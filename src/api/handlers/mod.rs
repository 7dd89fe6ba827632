//! REST endpoint handlers organized by resource.

pub mod entry;
pub mod lock;
pub mod logbook;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(logbook::routes())
        .merge(entry::routes())
        .merge(lock::routes())
}
