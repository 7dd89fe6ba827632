//! Data Transfer Objects for REST request/response serialization.
//!
//! Response types also derive `Deserialize` so the edit-lock client can
//! decode them.

pub mod common_dto;
pub mod entry_dto;
pub mod lock_dto;
pub mod logbook_dto;

pub use common_dto::*;
pub use entry_dto::*;
pub use lock_dto::*;
pub use logbook_dto::*;
