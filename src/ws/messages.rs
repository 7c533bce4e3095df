//! WebSocket frame types: client commands and server frames.
//!
//! Every frame is a JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};

use crate::domain::ChatMessage;
use crate::error::{ProtocolError, RelayError};

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Ask to enter a room: `{"type":"join","room":"r1","token":"…"}`.
    Join {
        /// Room name.
        room: String,
        /// Credential handed to the identity verifier.
        token: String,
    },
    /// Publish a message to the joined room: `{"type":"send","message":"hi"}`.
    Send {
        /// Message text.
        message: String,
    },
    /// Leave the room and end the stream: `{"type":"close"}`.
    Close,
}

impl ClientFrame {
    const KNOWN_TYPES: [&'static str; 3] = ["join", "send", "close"];

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedFrame`] when the text is not a JSON
    /// object with a string `type` or a known type lacks required fields,
    /// and [`ProtocolError::UnknownType`] for an unrecognised `type`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

        let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
            return Err(ProtocolError::MalformedFrame(
                "missing string field `type`".to_string(),
            ));
        };
        if !Self::KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A room message.
    Message {
        /// Display name of the sender (`"system"` for room notices).
        sender: String,
        /// Message text.
        body: String,
        /// Per-room sequence number.
        seq: u64,
    },
    /// A failure; always followed by [`ServerFrame::Close`].
    Error {
        /// Stable error code, e.g. `"NotJoined"`.
        code: String,
        /// Human-readable description.
        detail: String,
    },
    /// Sent immediately before the server terminates the stream.
    Close,
}

impl ServerFrame {
    /// Builds the `error` frame describing `err`.
    #[must_use]
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            detail: err.to_string(),
        }
    }

    /// Serializes the frame to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if serialization fails.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Internal(e.to_string()))
    }
}

impl From<&ChatMessage> for ServerFrame {
    fn from(message: &ChatMessage) -> Self {
        Self::Message {
            sender: message.sender().display_name().to_string(),
            body: message.body().to_string(),
            seq: message.sent_at(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ClientIdentity, RoomId};
    use crate::error::AuthError;

    #[test]
    fn decodes_join_and_send() {
        let join = ClientFrame::decode(r#"{"type":"join","room":"r1","token":"t"}"#);
        assert_eq!(
            join,
            Ok(ClientFrame::Join {
                room: "r1".to_string(),
                token: "t".to_string(),
            })
        );

        let send = ClientFrame::decode(r#"{"type":"send","message":"hi"}"#);
        assert_eq!(
            send,
            Ok(ClientFrame::Send {
                message: "hi".to_string(),
            })
        );

        assert_eq!(ClientFrame::decode(r#"{"type":"close"}"#), Ok(ClientFrame::Close));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            ClientFrame::decode("hello"),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn legacy_frame_without_type_is_malformed() {
        let res = ClientFrame::decode(r#"{"message":"hi","sender":"bob"}"#);
        assert!(matches!(res, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        let res = ClientFrame::decode(r#"{"type":"typing"}"#);
        assert_eq!(res, Err(ProtocolError::UnknownType("typing".to_string())));
    }

    #[test]
    fn known_type_missing_fields_is_malformed() {
        let res = ClientFrame::decode(r#"{"type":"join","room":"r1"}"#);
        assert!(matches!(res, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn message_frame_wire_shape() {
        let Ok(room) = RoomId::parse("r1") else {
            panic!("valid room");
        };
        let msg = ChatMessage::user(room, ClientIdentity::new("u-b", "B"), "hi".to_string(), 1);
        let Ok(json) = ServerFrame::from(&msg).encode() else {
            panic!("encode failed");
        };
        assert_eq!(json, r#"{"type":"message","sender":"B","body":"hi","seq":1}"#);
    }

    #[test]
    fn error_and_close_wire_shape() {
        let frame = ServerFrame::error(&RelayError::from(AuthError::Invalid));
        let Ok(json) = frame.encode() else {
            panic!("encode failed");
        };
        assert_eq!(
            json,
            r#"{"type":"error","code":"Invalid","detail":"invalid credentials"}"#
        );
        assert_eq!(ServerFrame::Close.encode().ok().as_deref(), Some(r#"{"type":"close"}"#));
    }
}
