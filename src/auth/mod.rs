//! Auth gate: turns a client-supplied token into a [`ClientIdentity`].
//!
//! The gate itself holds no credentials. It delegates to an
//! [`IdentityVerifier`], the seam where an external identity source plugs in,
//! and adds the expiry check on top.

pub mod static_verifier;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::ClientIdentity;
use crate::error::AuthError;

pub use static_verifier::{StaticTokenVerifier, TokenTableError};

/// What an identity source knows about a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Identity the token stands for.
    pub identity: ClientIdentity,
    /// Instant after which the token is no longer accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

/// External identity source.
pub trait IdentityVerifier: Send + Sync + fmt::Debug {
    /// Looks up `token`. Returns `None` for tokens the source does not know.
    fn verify(&self, token: &str) -> Option<Credential>;
}

/// Validates credentials before a connection may join a room.
///
/// Stateless and idempotent: the same token yields the same answer until
/// it expires.
#[derive(Debug, Clone)]
pub struct AuthGate {
    verifier: Arc<dyn IdentityVerifier>,
}

impl AuthGate {
    /// Creates a gate backed by `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { verifier }
    }

    /// Authenticates `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Invalid`] for empty or unknown tokens and
    /// [`AuthError::Expired`] for tokens past their expiry.
    pub fn authenticate(&self, token: &str) -> Result<ClientIdentity, AuthError> {
        self.authenticate_at(token, Utc::now())
    }

    /// Authenticates `token` as of `now`.
    ///
    /// # Errors
    ///
    /// Same as [`AuthGate::authenticate`].
    pub fn authenticate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ClientIdentity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Invalid);
        }
        let credential = self.verifier.verify(token).ok_or(AuthError::Invalid)?;
        if credential.expires_at.is_some_and(|expiry| expiry <= now) {
            tracing::debug!(user_id = credential.identity.user_id(), "expired token presented");
            return Err(AuthError::Expired);
        }
        Ok(credential.identity)
    }
}
