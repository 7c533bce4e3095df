//! Data Transfer Objects for REST response serialization.
//!
//! DTOs are plain serde structs decoupled from the domain types so the wire
//! shape can stay stable while the domain evolves.

pub mod common_dto;
pub mod room_dto;

pub use common_dto::*;
pub use room_dto::*;
