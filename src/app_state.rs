//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{AuthGate, IdentityVerifier};
use crate::config::RelayConfig;
use crate::domain::RoomRegistry;
use crate::ws::Dispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live rooms, read by the REST endpoints.
    pub registry: Arc<RoomRegistry>,
    /// Drives every WebSocket connection.
    pub dispatcher: Dispatcher,
    /// Frame size limit handed to the WebSocket upgrade.
    pub max_frame_bytes: usize,
}

impl AppState {
    /// Wires registry, auth gate and dispatcher from `config`.
    #[must_use]
    pub fn new(config: &RelayConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let registry = Arc::new(RoomRegistry::new(
            config.room_settings(),
            config.room_empty_grace(),
        ));
        let dispatcher = Dispatcher::new(
            AuthGate::new(verifier),
            Arc::clone(&registry),
            config.dispatcher_settings(),
        );
        Self {
            registry,
            dispatcher,
            max_frame_bytes: config.max_frame_bytes(),
        }
    }
}
