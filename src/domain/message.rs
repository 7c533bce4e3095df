//! Chat messages admitted into a room.

use chrono::{DateTime, Utc};

use super::{ClientIdentity, RoomId};

/// Origin of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Published by a room member.
    User,
    /// Generated by the room itself (join and leave notices).
    System,
}

/// A message as sequenced by its room.
///
/// Immutable once constructed. `sent_at` is the per-room sequence number:
/// user messages get a fresh, strictly increasing value; system notices
/// reuse the room's latest value so delivery order stays nondecreasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    sender: ClientIdentity,
    body: String,
    sent_at: u64,
    room_id: RoomId,
    kind: MessageKind,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a user message with an already assigned sequence number.
    #[must_use]
    pub fn user(room_id: RoomId, sender: ClientIdentity, body: String, sent_at: u64) -> Self {
        Self {
            sender,
            body,
            sent_at,
            room_id,
            kind: MessageKind::User,
            timestamp: Utc::now(),
        }
    }

    /// Creates a room notice stamped with the room's current sequence.
    #[must_use]
    pub fn system(room_id: RoomId, body: String, sent_at: u64) -> Self {
        Self {
            sender: ClientIdentity::system(),
            body,
            sent_at,
            room_id,
            kind: MessageKind::System,
            timestamp: Utc::now(),
        }
    }

    /// Identity of the member that published the message.
    #[must_use]
    pub fn sender(&self) -> &ClientIdentity {
        &self.sender
    }

    /// Message text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Per-room sequence number.
    #[must_use]
    pub const fn sent_at(&self) -> u64 {
        self.sent_at
    }

    /// Room the message was published in.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Whether the message came from a member or from the room.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Wall-clock admission time, for display only.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
