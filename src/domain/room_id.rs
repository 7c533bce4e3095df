//! Validated room identifier.

use std::fmt;

use serde::Serialize;

use crate::error::JoinError;

/// Maximum length of a room name in bytes.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Name of a chat room.
///
/// Between 1 and [`MAX_ROOM_ID_LEN`] characters drawn from ASCII
/// alphanumerics, `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parses and validates a room name.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::InvalidRoom`] if the name is empty, too long,
    /// or contains characters outside the allowed set.
    pub fn parse(raw: &str) -> Result<Self, JoinError> {
        if raw.is_empty() || raw.len() > MAX_ROOM_ID_LEN {
            return Err(JoinError::InvalidRoom(format!(
                "room name must be 1..={MAX_ROOM_ID_LEN} characters"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(JoinError::InvalidRoom(format!(
                "unexpected character {bad:?} in room name"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the room name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["r1", "lawyer_client_room", "consult-42", "a.b"] {
            let Ok(id) = RoomId::parse(name) else {
                panic!("{name} should be valid");
            };
            assert_eq!(id.as_str(), name);
        }
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(matches!(RoomId::parse(""), Err(JoinError::InvalidRoom(_))));
        let long = "x".repeat(MAX_ROOM_ID_LEN + 1);
        assert!(matches!(RoomId::parse(&long), Err(JoinError::InvalidRoom(_))));
        assert!(RoomId::parse(&"x".repeat(MAX_ROOM_ID_LEN)).is_ok());
    }

    #[test]
    fn rejects_path_characters() {
        assert!(RoomId::parse("../etc").is_err());
        assert!(RoomId::parse("room one").is_err());
        assert!(RoomId::parse("salle/1").is_err());
    }
}
