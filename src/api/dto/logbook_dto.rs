//! Logbook DTOs for create, get, update and list operations.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams, default_page, default_per_page};
use crate::domain::{AttributeDef, Logbook, LogbookId, NewLogbook};
use crate::service::LogbookChange;

/// Request body for `POST /logbooks`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLogbookRequest {
    /// Parent logbook; omit for a top-level logbook.
    #[serde(default)]
    pub parent_id: Option<LogbookId>,
    /// Display name, must not be empty.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Content pre-filled into new entries.
    #[serde(default)]
    pub template: String,
    /// Attributes entries may carry.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

impl From<CreateLogbookRequest> for NewLogbook {
    fn from(req: CreateLogbookRequest) -> Self {
        Self {
            parent_id: req.parent_id,
            name: req.name,
            description: req.description,
            template: req.template,
            attributes: req.attributes,
        }
    }
}

/// Request body for `PUT /logbooks/{logbook_id}`. Absent fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateLogbookRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New entry template.
    #[serde(default)]
    pub template: Option<String>,
    /// Replacement attribute definitions.
    #[serde(default)]
    pub attributes: Option<Vec<AttributeDef>>,
}

impl From<UpdateLogbookRequest> for LogbookChange {
    fn from(req: UpdateLogbookRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            template: req.template,
            attributes: req.attributes,
        }
    }
}

/// Single logbook wrapper returned by create, get and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogbookResponse {
    /// The logbook.
    pub logbook: Logbook,
}

/// Query parameters for `GET /logbooks`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogbookListParams {
    /// Only list direct children of this logbook.
    #[serde(default)]
    #[param(value_type = Option<u64>)]
    pub parent: Option<LogbookId>,
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl LogbookListParams {
    /// Pagination part of the query.
    #[must_use]
    pub const fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Paginated list response for `GET /logbooks`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogbookListResponse {
    /// Logbooks on this page, ordered by id.
    pub data: Vec<Logbook>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
