//! Domain layer: identities, rooms, messages and the room registry.
//!
//! This module contains the server-side chat model: who is speaking
//! ([`ClientIdentity`]), where ([`Room`], keyed by [`RoomId`]), what was said
//! ([`ChatMessage`]), and the [`RoomRegistry`] that owns every live room.

pub mod connection_id;
pub mod identity;
pub mod message;
pub mod room;
pub mod room_id;
pub mod room_registry;

pub use connection_id::ConnectionId;
pub use identity::ClientIdentity;
pub use message::{ChatMessage, MessageKind};
pub use room::{Room, RoomSettings, RoomSnapshot};
pub use room_id::RoomId;
pub use room_registry::RoomRegistry;
