//! Per-connection entry point: admission, relay loop, teardown.
//!
//! [`Dispatcher::on_connect`] is invoked once per accepted transport. It is
//! the only place where failures from several components meet, and every
//! one of them leaves as an `error` frame followed by a `close` frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Instrument;

use super::connection::{Connection, ConnectionHandle};
use super::messages::{ClientFrame, ServerFrame};
use super::transport::Transport;
use crate::auth::AuthGate;
use crate::domain::{Room, RoomId, RoomRegistry};
use crate::error::{JoinError, ProtocolError, RelayError};

/// Attempts at joining when the room is torn down under us.
const JOIN_ATTEMPTS: usize = 3;

/// Connection-level limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// How long a new connection may take to send its `join` frame.
    pub join_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Largest accepted message body in bytes.
    pub max_message_bytes: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            outbound_queue_capacity: 256,
            max_message_bytes: 4096,
        }
    }
}

/// How a joined session ended without error.
enum Ending {
    /// The client asked to close; we answer with a `close` frame.
    ClientClose,
    /// The peer disappeared; nothing left to send.
    Hangup,
}

/// Pairs incoming transports with the auth gate and the room registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    auth: AuthGate,
    registry: Arc<RoomRegistry>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(auth: AuthGate, registry: Arc<RoomRegistry>, settings: DispatcherSettings) -> Self {
        Self {
            auth,
            registry,
            settings,
        }
    }

    /// Room registry shared with the REST layer.
    #[must_use]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Serves one transport until it closes.
    pub async fn on_connect<T: Transport>(&self, mut transport: T) {
        let (mut connection, mut outbound_rx) =
            Connection::new(self.settings.outbound_queue_capacity);
        let span = tracing::info_span!("connection", conn_id = %connection.id());

        async {
            tracing::debug!("transport accepted");
            match self.admit(&mut connection, &mut transport).await {
                Ok(Some(room)) => {
                    let outcome = self
                        .relay(&mut connection, &room, &mut transport, &mut outbound_rx)
                        .await;
                    connection.begin_close();
                    drop(outbound_rx);
                    self.depart(&connection, &room).await;
                    match outcome {
                        Ok(Ending::ClientClose) => {
                            send_frame(&mut transport, &ServerFrame::Close).await;
                            transport.close().await;
                        }
                        Ok(Ending::Hangup) => {}
                        Err(err) => reject(&mut transport, &err).await,
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    connection.begin_close();
                    reject(&mut transport, &err).await;
                }
            }
            connection.finish_close();
            tracing::debug!("connection closed");
        }
        .instrument(span)
        .await;
    }

    /// Reads the `join` frame, authenticates and enters the room.
    ///
    /// `Ok(None)` means the peer left before joining.
    async fn admit<T: Transport>(
        &self,
        connection: &mut Connection,
        transport: &mut T,
    ) -> Result<Option<Arc<Room>>, RelayError> {
        let first = tokio::time::timeout(self.settings.join_timeout, next_frame(transport))
            .await
            .map_err(|_| ProtocolError::JoinTimeout)?;

        let (room, token) = match first {
            None | Some(Ok(ClientFrame::Close)) => return Ok(None),
            Some(Err(err)) => return Err(err),
            Some(Ok(ClientFrame::Send { .. })) => return Err(ProtocolError::NotJoined.into()),
            Some(Ok(ClientFrame::Join { room, token })) => (room, token),
        };

        let room_id = RoomId::parse(&room)?;
        let identity = self.auth.authenticate(&token)?;
        tracing::debug!(user_id = identity.user_id(), room = %room_id, "authenticated");
        connection.authenticate(identity)?;
        let handle = connection.handle()?;

        let room = self.registry.get_or_create(&room_id).await;
        let room = match self.join_from(room, &handle).await {
            Ok(room) => room,
            Err(err) => {
                self.registry.release(room_id).await;
                return Err(err.into());
            }
        };

        connection.mark_joined(room_id)?;
        Ok(Some(room))
    }

    /// Joins `room`, falling back to a fresh lookup while the registry is
    /// tearing rooms down under us. At most [`JOIN_ATTEMPTS`] joins are tried.
    async fn join_from(
        &self,
        mut room: Arc<Room>,
        handle: &ConnectionHandle,
    ) -> Result<Arc<Room>, JoinError> {
        let mut attempt = 1;
        loop {
            match room.join(handle.clone()).await {
                Ok(()) => return Ok(room),
                Err(JoinError::RoomClosing) if attempt < JOIN_ATTEMPTS => {
                    tracing::debug!(room = %room.id(), attempt, "room closed during join, retrying");
                    attempt += 1;
                    room = self.registry.get_or_create(room.id()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Relays between the transport and the room until either side ends.
    async fn relay<T: Transport>(
        &self,
        connection: &mut Connection,
        room: &Room,
        transport: &mut T,
        outbound_rx: &mut mpsc::Receiver<ServerFrame>,
    ) -> Result<Ending, RelayError> {
        loop {
            tokio::select! {
                inbound = next_frame(transport) => match inbound {
                    None => return Ok(Ending::Hangup),
                    Some(Err(err)) => return Err(err),
                    Some(Ok(ClientFrame::Send { message })) => {
                        connection.require_joined()?;
                        if message.len() > self.settings.max_message_bytes {
                            return Err(ProtocolError::MessageTooLarge {
                                limit: self.settings.max_message_bytes,
                            }
                            .into());
                        }
                        room.publish(connection.id(), message).await?;
                    }
                    Some(Ok(ClientFrame::Join { .. })) => {
                        return Err(ProtocolError::AlreadyJoined.into());
                    }
                    Some(Ok(ClientFrame::Close)) => return Ok(Ending::ClientClose),
                },
                Some(frame) = outbound_rx.recv() => {
                    transport.send(frame.encode()?).await?;
                }
            }
        }
    }

    /// Leaves the room and lets the registry reclaim it once empty.
    async fn depart(&self, connection: &Connection, room: &Room) {
        room.leave(connection.id()).await;
        if room.member_count().await == 0 {
            self.registry.release(room.id().clone()).await;
        }
    }
}

/// Reads and decodes the next client frame.
async fn next_frame<T: Transport>(transport: &mut T) -> Option<Result<ClientFrame, RelayError>> {
    let text = match transport.receive().await? {
        Ok(text) => text,
        Err(err) => return Some(Err(err)),
    };
    Some(ClientFrame::decode(&text).map_err(RelayError::from))
}

async fn send_frame<T: Transport>(transport: &mut T, frame: &ServerFrame) {
    match frame.encode() {
        Ok(text) => {
            if let Err(err) = transport.send(text).await {
                tracing::debug!(%err, "frame not delivered");
            }
        }
        Err(err) => tracing::error!(%err, "frame encoding failed"),
    }
}

/// Reports `err` to the client and terminates the stream.
async fn reject<T: Transport>(transport: &mut T, err: &RelayError) {
    if err.is_disconnect() {
        tracing::debug!(%err, "transport failed");
        transport.close().await;
        return;
    }
    tracing::info!(code = err.code(), %err, "closing connection with error");
    send_frame(transport, &ServerFrame::error(err)).await;
    send_frame(transport, &ServerFrame::Close).await;
    transport.close().await;
}
