//! Edit-lock DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{EntryLock, LockId};

/// Query parameters for `POST .../lock`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AcquireLockParams {
    /// Cancel another client's lock and take it over.
    #[serde(default)]
    pub steal: bool,
}

/// Query parameters for `DELETE .../lock`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CancelLockParams {
    /// Only cancel the active lock if it is this one.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub lock_id: Option<LockId>,
}

/// Lock wrapper returned by every lock endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    /// The lock.
    pub lock: EntryLock,
}
