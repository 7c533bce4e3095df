//! In-memory token table configured through `AUTH_TOKENS`.
//!
//! Format: comma-separated `token:user_id:display_name[:expires_unix]`
//! entries, e.g. `s3cret:u1:Alice,t0ken:u2:Bob:1767225600`.

use std::collections::HashMap;
use std::fmt;

use chrono::DateTime;

use super::{Credential, IdentityVerifier};
use crate::domain::ClientIdentity;

/// Error raised for a malformed `AUTH_TOKENS` entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid token entry #{index}: {reason}")]
pub struct TokenTableError {
    /// Zero-based position of the entry in the list.
    pub index: usize,
    /// What is wrong with it.
    pub reason: String,
}

/// [`IdentityVerifier`] backed by a fixed token table.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Credential>,
}

impl StaticTokenVerifier {
    /// Creates an empty table; every token is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, credential: Credential) -> Self {
        self.tokens.insert(token.into(), credential);
        self
    }

    /// Parses the `AUTH_TOKENS` format. Blank input yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`TokenTableError`] for entries with missing fields, empty
    /// tokens, an unparsable expiry, or the reserved display name
    /// [`ClientIdentity::SYSTEM_NAME`].
    pub fn parse(table: &str) -> Result<Self, TokenTableError> {
        let mut verifier = Self::new();
        for (index, entry) in table
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .enumerate()
        {
            let fail = |reason: &str| TokenTableError {
                index,
                reason: reason.to_string(),
            };
            let mut parts = entry.splitn(4, ':').map(str::trim);
            let (Some(token), Some(user_id), Some(display_name)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(fail("expected token:user_id:display_name"));
            };
            if token.is_empty() || user_id.is_empty() || display_name.is_empty() {
                return Err(fail("fields must not be empty"));
            }
            if display_name.eq_ignore_ascii_case(ClientIdentity::SYSTEM_NAME) {
                return Err(fail("display name is reserved for room notices"));
            }
            let expires_at = match parts.next() {
                None => None,
                Some(raw) => {
                    let secs: i64 = raw.parse().map_err(|_| fail("expiry must be unix seconds"))?;
                    Some(
                        DateTime::from_timestamp(secs, 0)
                            .ok_or_else(|| fail("expiry out of range"))?,
                    )
                }
            };
            verifier.tokens.insert(
                token.to_string(),
                Credential {
                    identity: ClientIdentity::new(user_id, display_name),
                    expires_at,
                },
            );
        }
        Ok(verifier)
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<Credential> {
        self.tokens.get(token).cloned()
    }
}
