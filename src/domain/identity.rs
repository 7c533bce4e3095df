//! Authenticated client identity.

use serde::{Deserialize, Serialize};

/// Who a connection speaks for.
///
/// Produced by the [`crate::auth::AuthGate`] and owned by the connection for
/// its whole lifetime. Fields are private so an identity cannot be altered
/// once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    user_id: String,
    display_name: String,
}

impl ClientIdentity {
    /// Display name used as the sender of room notices.
    pub const SYSTEM_NAME: &'static str = "system";

    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// The identity attached to server-generated notices.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Self::SYSTEM_NAME, Self::SYSTEM_NAME)
    }

    /// Stable user identifier issued by the identity source.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Name shown to other room members.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
