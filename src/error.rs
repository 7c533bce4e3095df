//! Relay error types with wire-code and HTTP status code mapping.
//!
//! Each component owns a small error enum ([`AuthError`], [`JoinError`],
//! [`ProtocolError`], [`ConnectionError`], [`TransportError`]).
//! [`RelayError`] wraps them all; the dispatcher turns it into an `error`
//! frame for WebSocket clients and the REST layer turns it into a JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Authentication failures reported by the [`crate::auth::AuthGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token is empty or unknown to the identity verifier.
    #[error("invalid credentials")]
    Invalid,

    /// The token was recognised but its validity window has passed.
    #[error("credentials expired")]
    Expired,
}

impl AuthError {
    /// Returns the wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Expired => "Expired",
        }
    }
}

/// Failures while admitting a connection into a room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// The room already holds its configured number of members.
    #[error("room is full")]
    Full,

    /// The room is being torn down and no longer admits members.
    #[error("room is closing")]
    RoomClosing,

    /// The requested room name is not a valid room identifier.
    #[error("invalid room id: {0}")]
    InvalidRoom(String),
}

impl JoinError {
    /// Returns the wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::RoomClosing => "RoomClosing",
            Self::InvalidRoom(_) => "InvalidRoom",
        }
    }
}

/// Violations of the client/server frame protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A `send` frame arrived before the connection joined a room.
    #[error("connection has not joined a room")]
    NotJoined,

    /// The frame is not valid JSON or lacks required fields.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame's `type` is not one the server understands.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    /// A second `join` arrived on an already joined connection.
    #[error("connection already joined a room")]
    AlreadyJoined,

    /// No `join` frame arrived within the configured timeout.
    #[error("no join frame received in time")]
    JoinTimeout,

    /// The message body exceeds the configured limit.
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge {
        /// Maximum accepted body size in bytes.
        limit: usize,
    },
}

impl ProtocolError {
    /// Returns the wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotJoined => "NotJoined",
            Self::MalformedFrame(_) => "MalformedFrame",
            Self::UnknownType(_) => "UnknownType",
            Self::AlreadyJoined => "AlreadyJoined",
            Self::JoinTimeout => "JoinTimeout",
            Self::MessageTooLarge { .. } => "MessageTooLarge",
        }
    }
}

/// Failures enqueueing a frame on a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The connection has been closed; its queue no longer accepts frames.
    #[error("connection closed")]
    Closed,

    /// The outbound queue is full; the frame was dropped.
    #[error("outbound queue full")]
    QueueFull,
}

impl ConnectionError {
    /// Returns the wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::QueueFull => "QueueFull",
        }
    }
}

/// Failures of the underlying byte stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone.
    #[error("transport closed")]
    Closed,

    /// Read or write failure reported by the transport.
    #[error("transport i/o: {0}")]
    Io(String),
}

/// Top-level relay error.
///
/// # Status Mapping
///
/// | Variant        | HTTP Status               |
/// |----------------|---------------------------|
/// | `Auth`         | 401 Unauthorized          |
/// | `Join`         | 409 Conflict / 400        |
/// | `Protocol`     | 400 Bad Request           |
/// | `RoomNotFound` | 404 Not Found             |
/// | others         | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Room admission failed.
    #[error(transparent)]
    Join(#[from] JoinError),

    /// The client broke the frame protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Enqueueing on a connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No room with the given id is currently active.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the wire error code carried in `error` frames.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Auth(err) => err.code(),
            Self::Join(err) => err.code(),
            Self::Protocol(err) => err.code(),
            Self::Connection(err) => err.code(),
            Self::Transport(_) => "Transport",
            Self::RoomNotFound(_) => "RoomNotFound",
            Self::Internal(_) => "Internal",
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Join(JoinError::InvalidRoom(_)) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Join(_) => StatusCode::CONFLICT,
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::Connection(_) | Self::Transport(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` when the peer is already gone and no frame can be
    /// delivered to it.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Structured JSON error response body.
///
/// ```json
/// { "error": { "code": "RoomNotFound", "message": "room not found: r1" } }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with a stable code and a human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error code (same codes as WebSocket `error` frames).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
