//! Per-connection state machine and outbound queue.
//!
//! A [`Connection`] is owned by the dispatcher task serving one transport.
//! Rooms never see the `Connection` itself; they hold a cloneable
//! [`ConnectionHandle`] that can only enqueue frames.

use std::fmt;

use tokio::sync::mpsc;

use super::messages::ServerFrame;
use crate::domain::{ClientIdentity, ConnectionId, RoomId};
use crate::error::{ConnectionError, ProtocolError};

/// Lifecycle of a connection.
///
/// ```text
/// Connecting ──► Authenticated ──► Joined
///      │               │             │
///      └───────────────┴─────────────┴──► Closing ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted, no credentials checked yet.
    Connecting,
    /// Identity verified, not yet a room member.
    Authenticated,
    /// Member of exactly one room.
    Joined,
    /// Shutting down after an explicit close or a fatal error.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated)
                | (Self::Authenticated, Self::Joined)
                | (
                    Self::Connecting | Self::Authenticated | Self::Joined,
                    Self::Closing
                )
                | (Self::Closing, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Joined => "joined",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Enqueue-only view of a connection, held by the room it joined.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: ClientIdentity,
    outbound: mpsc::Sender<ServerFrame>,
}

impl ConnectionHandle {
    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated identity of the client behind this connection.
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Enqueues a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] once the owning connection is
    /// gone and [`ConnectionError::QueueFull`] when the client is not
    /// draining its queue fast enough.
    pub fn send(&self, frame: ServerFrame) -> Result<(), ConnectionError> {
        enqueue(&self.outbound, frame)
    }

    /// Frames that can be enqueued right now without hitting `QueueFull`.
    #[must_use]
    pub fn spare_capacity(&self) -> usize {
        self.outbound.capacity()
    }
}

fn enqueue(outbound: &mpsc::Sender<ServerFrame>, frame: ServerFrame) -> Result<(), ConnectionError> {
    outbound.try_send(frame).map_err(|err| match err {
        mpsc::error::TrySendError::Full(_) => ConnectionError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed,
    })
}

/// Server-side state for one client transport.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    identity: Option<ClientIdentity>,
    room_id: Option<RoomId>,
    outbound: mpsc::Sender<ServerFrame>,
}

impl Connection {
    /// Creates a connection in [`ConnectionState::Connecting`] together with
    /// the receiving end of its bounded outbound queue.
    #[must_use]
    pub fn new(queue_capacity: usize) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (outbound, rx) = mpsc::channel(queue_capacity.max(1));
        let connection = Self {
            id: ConnectionId::new(),
            state: ConnectionState::Connecting,
            identity: None,
            room_id: None,
            outbound,
        };
        (connection, rx)
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity, once authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// Joined room, once admitted.
    #[must_use]
    pub const fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Enqueues a frame for asynchronous write.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] after the connection reached
    /// [`ConnectionState::Closed`], otherwise the errors of
    /// [`ConnectionHandle::send`].
    pub fn send(&self, frame: ServerFrame) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }
        enqueue(&self.outbound, frame)
    }

    /// Records the verified identity. Happens at most once.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AlreadyJoined`] if the connection is past
    /// the `Connecting` state.
    pub fn authenticate(&mut self, identity: ClientIdentity) -> Result<(), ProtocolError> {
        self.transition(ConnectionState::Authenticated)
            .map_err(|_| ProtocolError::AlreadyJoined)?;
        self.identity = Some(identity);
        Ok(())
    }

    /// Returns the handle a room stores for this connection.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotJoined`] if the connection has no
    /// authenticated identity yet.
    pub fn handle(&self) -> Result<ConnectionHandle, ProtocolError> {
        let identity = self.identity.clone().ok_or(ProtocolError::NotJoined)?;
        Ok(ConnectionHandle {
            id: self.id,
            identity,
            outbound: self.outbound.clone(),
        })
    }

    /// Marks the connection as a member of `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AlreadyJoined`] unless the connection is
    /// `Authenticated`.
    pub fn mark_joined(&mut self, room_id: RoomId) -> Result<(), ProtocolError> {
        self.transition(ConnectionState::Joined)
            .map_err(|_| ProtocolError::AlreadyJoined)?;
        self.room_id = Some(room_id);
        Ok(())
    }

    /// Returns the joined room, or rejects the request and starts closing.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotJoined`] when the connection is not in
    /// the `Joined` state; the connection moves to `Closing`.
    pub fn require_joined(&mut self) -> Result<&RoomId, ProtocolError> {
        if self.state != ConnectionState::Joined {
            self.begin_close();
            return Err(ProtocolError::NotJoined);
        }
        self.room_id.as_ref().ok_or(ProtocolError::NotJoined)
    }

    /// Moves to `Closing`. No-op when already closing or closed.
    pub fn begin_close(&mut self) {
        if self.state.can_transition_to(ConnectionState::Closing) {
            self.state = ConnectionState::Closing;
        }
    }

    /// Moves to the terminal `Closed` state.
    pub fn finish_close(&mut self) {
        self.begin_close();
        self.state = ConnectionState::Closed;
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), ConnectionState> {
        if !self.state.can_transition_to(next) {
            tracing::debug!(conn_id = %self.id, from = %self.state, to = %next, "illegal transition");
            return Err(self.state);
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn joined_connection() -> (Connection, mpsc::Receiver<ServerFrame>) {
        let (mut conn, rx) = Connection::new(4);
        let Ok(()) = conn.authenticate(ClientIdentity::new("u1", "Ann")) else {
            panic!("authenticate failed");
        };
        let Ok(room) = RoomId::parse("r1") else {
            panic!("valid room");
        };
        let Ok(()) = conn.mark_joined(room) else {
            panic!("join failed");
        };
        (conn, rx)
    }

    #[test]
    fn happy_path_transitions() {
        let (mut conn, _rx) = joined_connection();
        assert_eq!(conn.state(), ConnectionState::Joined);
        assert_eq!(conn.room_id().map(RoomId::as_str), Some("r1"));
        conn.begin_close();
        assert_eq!(conn.state(), ConnectionState::Closing);
        conn.finish_close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn identity_is_set_once() {
        let (mut conn, _rx) = joined_connection();
        let res = conn.authenticate(ClientIdentity::new("u2", "Mallory"));
        assert_eq!(res, Err(ProtocolError::AlreadyJoined));
        assert_eq!(conn.identity().map(ClientIdentity::user_id), Some("u1"));
    }

    #[test]
    fn cannot_join_before_authenticating() {
        let (mut conn, _rx) = Connection::new(4);
        let Ok(room) = RoomId::parse("r1") else {
            panic!("valid room");
        };
        assert_eq!(conn.mark_joined(room), Err(ProtocolError::AlreadyJoined));
        assert!(conn.handle().is_err());
    }

    #[test]
    fn require_joined_rejects_and_starts_closing() {
        let (mut conn, _rx) = Connection::new(4);
        assert_eq!(conn.require_joined(), Err(ProtocolError::NotJoined));
        assert_eq!(conn.state(), ConnectionState::Closing);
    }

    #[tokio::test]
    async fn send_enqueues_in_order() {
        let (conn, mut rx) = joined_connection();
        let Ok(handle) = conn.handle() else {
            panic!("handle");
        };
        assert!(conn.send(ServerFrame::Close).is_ok());
        assert!(
            handle
                .send(ServerFrame::Message {
                    sender: "x".to_string(),
                    body: "y".to_string(),
                    seq: 1,
                })
                .is_ok()
        );
        assert_eq!(rx.recv().await, Some(ServerFrame::Close));
        assert!(matches!(rx.recv().await, Some(ServerFrame::Message { seq: 1, .. })));
    }

    #[test]
    fn send_after_close_fails() {
        let (mut conn, _rx) = joined_connection();
        conn.finish_close();
        assert_eq!(conn.send(ServerFrame::Close), Err(ConnectionError::Closed));
    }

    #[test]
    fn full_queue_reports_backpressure() {
        let (conn, _rx) = Connection::new(1);
        assert!(conn.send(ServerFrame::Close).is_ok());
        assert_eq!(conn.send(ServerFrame::Close), Err(ConnectionError::QueueFull));
    }

    #[test]
    fn handle_send_fails_once_receiver_dropped() {
        let (conn, rx) = joined_connection();
        let Ok(handle) = conn.handle() else {
            panic!("handle");
        };
        drop(rx);
        assert_eq!(handle.send(ServerFrame::Close), Err(ConnectionError::Closed));
    }
}
