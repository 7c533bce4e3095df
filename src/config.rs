//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default; see
//! [`RelayConfig::from_env`] for the list.

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::{StaticTokenVerifier, TokenTableError};
use crate::domain::RoomSettings;
use crate::ws::DispatcherSettings;

/// Floor for [`RelayConfig::max_frame_bytes`].
const MIN_FRAME_BYTES: usize = 1024 * 1024;

/// Startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        /// Raw value.
        value: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// `LOG_FORMAT` is neither `pretty` nor `json`.
    #[error("invalid LOG_FORMAT {0:?}: expected `pretty` or `json`")]
    LogFormat(String),

    /// `AUTH_TOKENS` has a malformed entry.
    #[error("invalid AUTH_TOKENS: {0}")]
    AuthTokens(#[from] TokenTableError),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Maximum members per room.
    pub room_capacity: usize,

    /// Messages kept per room for replay to late joiners.
    pub room_history_capacity: usize,

    /// Milliseconds an empty room survives before removal.
    pub room_empty_grace_ms: u64,

    /// Whether publishers receive their own messages.
    pub echo_to_sender: bool,

    /// Frames buffered per connection before new ones are dropped.
    pub outbound_queue_capacity: usize,

    /// Seconds a new connection has to send its `join` frame.
    pub join_timeout_secs: u64,

    /// Largest accepted message body in bytes.
    pub max_message_bytes: usize,

    /// Raw token table, `token:user_id:display_name[:expires_unix]`, comma
    /// separated. Parsed by [`crate::auth::StaticTokenVerifier::parse`].
    pub auth_tokens: String,

    /// Tracing output format.
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            room_capacity: 64,
            room_history_capacity: 100,
            room_empty_grace_ms: 5_000,
            echo_to_sender: true,
            outbound_queue_capacity: 256,
            join_timeout_secs: 10,
            max_message_bytes: 4096,
            auth_tokens: String::new(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`RelayConfig::default`] for unset variables and for
    /// numeric or boolean values that do not parse. Calls
    /// `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LISTEN_ADDR` | `0.0.0.0:3000` |
    /// | `ROOM_CAPACITY` | `64` |
    /// | `ROOM_HISTORY_CAPACITY` | `100` |
    /// | `ROOM_EMPTY_GRACE_MS` | `5000` |
    /// | `ECHO_TO_SENDER` | `true` |
    /// | `OUTBOUND_QUEUE_CAPACITY` | `256` |
    /// | `JOIN_TIMEOUT_SECS` | `10` |
    /// | `MAX_MESSAGE_BYTES` | `4096` |
    /// | `AUTH_TOKENS` | empty |
    /// | `LOG_FORMAT` | `pretty` |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR` or `LOG_FORMAT` is set to
    /// an unparsable value. `AUTH_TOKENS` is checked later by
    /// [`RelayConfig::token_verifier`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(value) => value
                .parse()
                .map_err(|source| ConfigError::ListenAddr { value, source })?,
            None => defaults.listen_addr,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") | Some("PRETTY") => LogFormat::Pretty,
            Some("json") | Some("JSON") => LogFormat::Json,
            Some(other) => return Err(ConfigError::LogFormat(other.to_string())),
        };

        Ok(Self {
            listen_addr,
            room_capacity: parse_or(&lookup, "ROOM_CAPACITY", defaults.room_capacity),
            room_history_capacity: parse_or(
                &lookup,
                "ROOM_HISTORY_CAPACITY",
                defaults.room_history_capacity,
            ),
            room_empty_grace_ms: parse_or(
                &lookup,
                "ROOM_EMPTY_GRACE_MS",
                defaults.room_empty_grace_ms,
            ),
            echo_to_sender: parse_bool_or(&lookup, "ECHO_TO_SENDER", defaults.echo_to_sender),
            outbound_queue_capacity: parse_or(
                &lookup,
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
            join_timeout_secs: parse_or(&lookup, "JOIN_TIMEOUT_SECS", defaults.join_timeout_secs),
            max_message_bytes: parse_or(&lookup, "MAX_MESSAGE_BYTES", defaults.max_message_bytes),
            auth_tokens: lookup("AUTH_TOKENS").unwrap_or_default(),
            log_format,
        })
    }

    /// Builds the token table from `AUTH_TOKENS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AuthTokens`] for a malformed entry.
    pub fn token_verifier(&self) -> Result<StaticTokenVerifier, ConfigError> {
        Ok(StaticTokenVerifier::parse(&self.auth_tokens)?)
    }

    /// Policy applied to every room.
    #[must_use]
    pub const fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            capacity: self.room_capacity,
            history_capacity: self.room_history_capacity,
            echo_to_sender: self.echo_to_sender,
        }
    }

    /// Limits applied to every connection.
    #[must_use]
    pub const fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            join_timeout: Duration::from_secs(self.join_timeout_secs),
            outbound_queue_capacity: self.outbound_queue_capacity,
            max_message_bytes: self.max_message_bytes,
        }
    }

    /// Grace period before an empty room is removed.
    #[must_use]
    pub const fn room_empty_grace(&self) -> Duration {
        Duration::from_millis(self.room_empty_grace_ms)
    }

    /// Largest WebSocket message accepted from a client.
    ///
    /// Kept well above [`RelayConfig::max_message_bytes`] so an oversized
    /// body still parses and is answered with a `MessageTooLarge` error
    /// frame; only traffic beyond this hard cap is cut at the socket.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        let escaped = self.max_message_bytes.saturating_mul(16).saturating_add(1024);
        if escaped > MIN_FRAME_BYTES {
            escaped
        } else {
            MIN_FRAME_BYTES
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RelayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let Ok(cfg) = config(&[]) else {
            panic!("defaults must load");
        };
        assert_eq!(cfg.listen_addr.port(), 3000);
        assert_eq!(cfg.room_settings(), RoomSettings::default());
        assert_eq!(cfg.dispatcher_settings(), DispatcherSettings::default());
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(cfg) = config(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("ROOM_CAPACITY", "2"),
            ("ECHO_TO_SENDER", "FALSE"),
            ("ROOM_EMPTY_GRACE_MS", "0"),
            ("LOG_FORMAT", "json"),
        ]) else {
            panic!("config must load");
        };
        assert_eq!(cfg.listen_addr.port(), 9000);
        assert_eq!(cfg.room_settings().capacity, 2);
        assert!(!cfg.room_settings().echo_to_sender);
        assert!(cfg.room_empty_grace().is_zero());
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let Ok(cfg) = config(&[("ROOM_CAPACITY", "lots")]) else {
            panic!("config must load");
        };
        assert_eq!(cfg.room_capacity, 64);
    }

    #[test]
    fn bad_listen_addr_is_an_error() {
        assert!(matches!(
            config(&[("LISTEN_ADDR", "nowhere")]),
            Err(ConfigError::ListenAddr { .. })
        ));
    }

    #[test]
    fn token_table_is_parsed_on_demand() {
        let Ok(cfg) = config(&[("AUTH_TOKENS", "t1:u1:Ann,t2:u2:Bob")]) else {
            panic!("config must load");
        };
        let Ok(verifier) = cfg.token_verifier() else {
            panic!("token table must parse");
        };
        assert_eq!(verifier.len(), 2);

        let Ok(cfg) = config(&[("AUTH_TOKENS", "just-a-token")]) else {
            panic!("config must load");
        };
        assert!(matches!(
            cfg.token_verifier(),
            Err(ConfigError::AuthTokens(_))
        ));
    }

    #[test]
    fn frame_limit_leaves_room_for_oversized_bodies() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.max_frame_bytes(), MIN_FRAME_BYTES);
        assert!(cfg.max_frame_bytes() > cfg.max_message_bytes * 100);

        let big = RelayConfig {
            max_message_bytes: 1024 * 1024,
            ..RelayConfig::default()
        };
        assert!(big.max_frame_bytes() > big.max_message_bytes * 6);
    }

    #[test]
    fn bad_log_format_is_an_error() {
        assert!(matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::LogFormat(_))
        ));
    }
}
