//! Room inspection DTOs for list, detail and history endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{ChatMessage, ClientIdentity, MessageKind, RoomSnapshot};

/// One entry of `GET /rooms`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    /// Room identifier.
    pub room_id: String,
    /// Current member count.
    pub member_count: usize,
    /// Sequence number of the latest user message (0 if none).
    pub last_seq: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Paginated response for `GET /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    /// Rooms on this page, ordered by id.
    pub data: Vec<RoomSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// A room member as exposed over REST.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberDto {
    /// Stable user identifier.
    pub user_id: String,
    /// Name shown as message sender.
    pub display_name: String,
}

impl From<&ClientIdentity> for MemberDto {
    fn from(identity: &ClientIdentity) -> Self {
        Self {
            user_id: identity.user_id().to_string(),
            display_name: identity.display_name().to_string(),
        }
    }
}

/// Response body for `GET /rooms/{room_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetailResponse {
    /// Room identifier.
    pub room_id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Maximum number of members.
    pub capacity: usize,
    /// Current members, ordered by display name.
    pub members: Vec<MemberDto>,
    /// Sequence number of the latest user message (0 if none).
    pub last_seq: u64,
}

impl From<&RoomSnapshot> for RoomDetailResponse {
    fn from(snapshot: &RoomSnapshot) -> Self {
        let mut members: Vec<MemberDto> = snapshot.members.iter().map(MemberDto::from).collect();
        members.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Self {
            room_id: snapshot.room_id.to_string(),
            created_at: snapshot.created_at,
            capacity: snapshot.capacity,
            members,
            last_seq: snapshot.last_seq,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageDto {
    /// Per-room sequence number.
    pub seq: u64,
    /// Sender display name.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// `user` or `system`.
    pub kind: String,
    /// Server receive time.
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatMessage> for MessageDto {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            seq: msg.sent_at(),
            sender: msg.sender().display_name().to_string(),
            body: msg.body().to_string(),
            kind: match msg.kind() {
                MessageKind::User => "user".to_string(),
                MessageKind::System => "system".to_string(),
            },
            timestamp: msg.timestamp(),
        }
    }
}

/// Response body for `GET /rooms/{room_id}/messages`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMessagesResponse {
    /// Room identifier.
    pub room_id: String,
    /// Replay buffer, oldest first.
    pub data: Vec<MessageDto>,
}
