//! A chat room: membership, bounded history and ordered fan-out.
//!
//! All mutations (`join`, `leave`, `publish`) go through one
//! [`tokio::sync::Mutex`] per room. Sequence assignment and the enqueue onto
//! every member's outbound queue happen inside the same critical section, so
//! each member sees messages in the order the room sequenced them.
//! Enqueueing never waits: a slow or dead member cannot hold up the others.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ChatMessage, ClientIdentity, ConnectionId, RoomId};
use crate::error::{ConnectionError, JoinError, ProtocolError};
use crate::ws::connection::ConnectionHandle;
use crate::ws::messages::ServerFrame;

/// Per-room policy shared by every room a registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum number of simultaneous members.
    pub capacity: usize,
    /// Number of recent messages kept for replay to late joiners.
    pub history_capacity: usize,
    /// Whether a publisher receives its own messages.
    pub echo_to_sender: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            capacity: 64,
            history_capacity: 100,
            echo_to_sender: true,
        }
    }
}

/// Point-in-time view of a room, used by the REST layer.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: RoomId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Configured member limit.
    pub capacity: usize,
    /// Identities of current members.
    pub members: Vec<ClientIdentity>,
    /// Latest assigned sequence number (0 before the first message).
    pub last_seq: u64,
    /// Replay buffer, oldest first.
    pub history: Vec<Arc<ChatMessage>>,
}

#[derive(Debug, Default)]
struct RoomInner {
    members: HashMap<ConnectionId, ConnectionHandle>,
    history: VecDeque<Arc<ChatMessage>>,
    last_seq: u64,
    closing: bool,
}

impl RoomInner {
    /// Enqueues `message` on a snapshot of the members, skipping `skip`.
    /// Members whose connection is gone are pruned afterwards.
    fn fan_out(&mut self, room_id: &RoomId, message: &ChatMessage, skip: Option<ConnectionId>) {
        let frame = ServerFrame::from(message);
        let recipients: Vec<ConnectionHandle> = self
            .members
            .values()
            .filter(|member| Some(member.id()) != skip)
            .cloned()
            .collect();

        let mut gone = Vec::new();
        for member in &recipients {
            match member.send(frame.clone()) {
                Ok(()) => {}
                Err(ConnectionError::QueueFull) => {
                    tracing::warn!(
                        room = %room_id,
                        conn_id = %member.id(),
                        seq = message.sent_at(),
                        "member queue full, dropping frame"
                    );
                }
                Err(ConnectionError::Closed) => gone.push(member.id()),
            }
        }

        for id in gone {
            if self.members.remove(&id).is_some() {
                tracing::debug!(room = %room_id, conn_id = %id, "pruned closed member");
            }
        }
    }
}

/// A named group of connections sharing message fan-out.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    settings: RoomSettings,
    created_at: DateTime<Utc>,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Creates an empty room.
    #[must_use]
    pub fn new(id: RoomId, settings: RoomSettings) -> Self {
        Self {
            id,
            settings,
            created_at: Utc::now(),
            inner: Mutex::new(RoomInner::default()),
        }
    }

    /// Room identifier.
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Admits a member.
    ///
    /// The joiner first receives the replay buffer (its newest entries, if
    /// the joiner's queue is smaller than the buffer), then existing members
    /// receive a join notice. The joiner itself gets no notice. Joining
    /// twice with the same connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Full`] at capacity and
    /// [`JoinError::RoomClosing`] once the registry started tearing the room
    /// down.
    pub async fn join(&self, member: ConnectionHandle) -> Result<(), JoinError> {
        let mut inner = self.inner.lock().await;
        if inner.closing {
            return Err(JoinError::RoomClosing);
        }
        if inner.members.contains_key(&member.id()) {
            return Ok(());
        }
        if inner.members.len() >= self.settings.capacity {
            return Err(JoinError::Full);
        }

        // Newest entries win when the joiner's queue cannot take them all.
        let oldest = inner.history.len().saturating_sub(member.spare_capacity());
        for message in inner.history.iter().skip(oldest) {
            if let Err(err) = member.send(ServerFrame::from(message.as_ref())) {
                tracing::debug!(room = %self.id, conn_id = %member.id(), %err, "history replay cut short");
                break;
            }
        }

        let notice = ChatMessage::system(
            self.id.clone(),
            format!("{} joined", member.identity().display_name()),
            inner.last_seq,
        );
        inner.fan_out(&self.id, &notice, None);

        tracing::info!(
            room = %self.id,
            conn_id = %member.id(),
            user_id = member.identity().user_id(),
            replayed = inner.history.len() - oldest,
            "member joined"
        );
        inner.members.insert(member.id(), member);
        Ok(())
    }

    /// Removes a member. Returns `false` if it was not a member.
    pub async fn leave(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(member) = inner.members.remove(&id) else {
            return false;
        };

        let notice = ChatMessage::system(
            self.id.clone(),
            format!("{} left", member.identity().display_name()),
            inner.last_seq,
        );
        inner.fan_out(&self.id, &notice, None);

        tracing::info!(
            room = %self.id,
            conn_id = %id,
            user_id = member.identity().user_id(),
            remaining = inner.members.len(),
            "member left"
        );
        true
    }

    /// Sequences `body` from member `from`, records it and fans it out.
    ///
    /// The sender identity is taken from the room's member table, never
    /// from the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotJoined`] if `from` is not a member.
    pub async fn publish(&self, from: ConnectionId, body: String) -> Result<u64, ProtocolError> {
        let mut inner = self.inner.lock().await;
        let sender = inner
            .members
            .get(&from)
            .map(|member| member.identity().clone())
            .ok_or(ProtocolError::NotJoined)?;

        inner.last_seq += 1;
        let seq = inner.last_seq;
        let message = Arc::new(ChatMessage::user(self.id.clone(), sender, body, seq));

        inner.history.push_back(Arc::clone(&message));
        while inner.history.len() > self.settings.history_capacity {
            inner.history.pop_front();
        }

        let skip = (!self.settings.echo_to_sender).then_some(from);
        inner.fan_out(&self.id, &message, skip);

        tracing::debug!(room = %self.id, conn_id = %from, seq, "message published");
        Ok(seq)
    }

    /// Marks the room as closing if it has no members.
    ///
    /// Once closing, every later [`Room::join`] fails with
    /// [`JoinError::RoomClosing`].
    pub async fn close_if_empty(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.members.is_empty() {
            inner.closing = true;
        }
        inner.closing
    }

    /// Number of current members.
    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    /// Latest assigned sequence number.
    pub async fn last_seq(&self) -> u64 {
        self.inner.lock().await.last_seq
    }

    /// Copies out members, sequence and history.
    pub async fn snapshot(&self) -> RoomSnapshot {
        let inner = self.inner.lock().await;
        let mut members: Vec<ClientIdentity> = inner
            .members
            .values()
            .map(|member| member.identity().clone())
            .collect();
        members.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        RoomSnapshot {
            room_id: self.id.clone(),
            created_at: self.created_at,
            capacity: self.settings.capacity,
            members,
            last_seq: inner.last_seq,
            history: inner.history.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::ws::connection::Connection;

    fn room(settings: RoomSettings) -> Room {
        let Ok(id) = RoomId::parse("r1") else {
            panic!("valid room");
        };
        Room::new(id, settings)
    }

    fn member(name: &str, queue: usize) -> (ConnectionHandle, mpsc::Receiver<ServerFrame>) {
        let (mut conn, rx) = Connection::new(queue);
        let Ok(()) = conn.authenticate(ClientIdentity::new(format!("u-{name}"), name)) else {
            panic!("authenticate");
        };
        let Ok(handle) = conn.handle() else {
            panic!("handle");
        };
        (handle, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// User-message sequence numbers in delivery order.
    fn user_seqs(frames: &[ServerFrame]) -> Vec<u64> {
        frames
            .iter()
            .filter_map(|f| match f {
                ServerFrame::Message { sender, seq, .. } if sender != ClientIdentity::SYSTEM_NAME => {
                    Some(*seq)
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn publish_assigns_strictly_increasing_seq_in_member_order() {
        let room = room(RoomSettings::default());
        let (a, mut rx_a) = member("A", 256);
        let (b, mut rx_b) = member("B", 256);
        let (c, mut rx_c) = member("C", 256);
        let ids = [a.id(), b.id(), c.id()];
        for handle in [a, b, c] {
            assert!(room.join(handle).await.is_ok());
        }

        let mut assigned = Vec::new();
        for i in 0..60u64 {
            let from = ids.get((i % 3) as usize).copied().unwrap_or_else(|| panic!("id"));
            let Ok(seq) = room.publish(from, format!("m{i}")).await else {
                panic!("publish failed");
            };
            assigned.push(seq);
        }

        assert!(assigned.windows(2).all(|w| matches!(w, [x, y] if x < y)));
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            assert_eq!(user_seqs(&drain(rx)), assigned);
        }
    }

    #[tokio::test]
    async fn all_frames_arrive_in_nondecreasing_seq() {
        let room = room(RoomSettings::default());
        let (a, mut rx_a) = member("A", 256);
        let a_id = a.id();
        assert!(room.join(a).await.is_ok());
        let _ = room.publish(a_id, "one".to_string()).await;
        let (b, _rx_b) = member("B", 256);
        let b_id = b.id();
        assert!(room.join(b).await.is_ok());
        let _ = room.publish(a_id, "two".to_string()).await;
        assert!(room.leave(b_id).await);

        let seqs: Vec<u64> = drain(&mut rx_a)
            .iter()
            .filter_map(|f| match f {
                ServerFrame::Message { seq, .. } => Some(*seq),
                _ => None,
            })
            .collect();
        assert_eq!(seqs, vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn capacity_plus_one_join_is_full() {
        let room = room(RoomSettings {
            capacity: 2,
            ..RoomSettings::default()
        });
        let (a, _ra) = member("A", 8);
        let (b, _rb) = member("B", 8);
        let (c, _rc) = member("C", 8);
        assert!(room.join(a).await.is_ok());
        assert!(room.join(b).await.is_ok());
        assert_eq!(room.join(c).await, Err(JoinError::Full));
        assert_eq!(room.member_count().await, 2);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let room = room(RoomSettings::default());
        let (a, _ra) = member("A", 8);
        let (b, mut rx_b) = member("B", 8);
        let a_id = a.id();
        assert!(room.join(b).await.is_ok());
        assert!(room.join(a).await.is_ok());
        let _ = drain(&mut rx_b);

        assert!(room.leave(a_id).await);
        let after_first = drain(&mut rx_b);
        assert!(!room.leave(a_id).await);
        let after_second = drain(&mut rx_b);

        assert_eq!(after_first.len(), 1);
        assert!(after_second.is_empty());
        assert_eq!(room.member_count().await, 1);
    }

    #[tokio::test]
    async fn join_notifies_existing_members_only() {
        let room = room(RoomSettings::default());
        let (a, mut rx_a) = member("A", 8);
        let (b, mut rx_b) = member("B", 8);
        assert!(room.join(a).await.is_ok());
        assert!(drain(&mut rx_a).is_empty());

        assert!(room.join(b).await.is_ok());
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerFrame::Message {
                sender: "system".to_string(),
                body: "B joined".to_string(),
                seq: 0,
            }]
        );
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn late_joiner_gets_bounded_history() {
        let room = room(RoomSettings {
            history_capacity: 3,
            ..RoomSettings::default()
        });
        let (a, _ra) = member("A", 64);
        let a_id = a.id();
        assert!(room.join(a).await.is_ok());
        for i in 1..=5 {
            let _ = room.publish(a_id, format!("m{i}")).await;
        }

        let (b, mut rx_b) = member("B", 64);
        assert!(room.join(b).await.is_ok());
        assert_eq!(user_seqs(&drain(&mut rx_b)), vec![3, 4, 5]);

        let snap = room.snapshot().await;
        assert_eq!(snap.history.len(), 3);
        assert_eq!(snap.last_seq, 5);
        assert_eq!(snap.members.len(), 2);
    }

    #[tokio::test]
    async fn replay_keeps_newest_when_queue_is_smaller_than_history() {
        let room = room(RoomSettings {
            history_capacity: 10,
            ..RoomSettings::default()
        });
        let (a, _ra) = member("A", 64);
        let a_id = a.id();
        assert!(room.join(a).await.is_ok());
        for i in 1..=6 {
            let _ = room.publish(a_id, format!("m{i}")).await;
        }

        let (b, mut rx_b) = member("B", 3);
        assert!(room.join(b).await.is_ok());
        assert_eq!(user_seqs(&drain(&mut rx_b)), vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn self_exclusion_policy() {
        let room = room(RoomSettings {
            echo_to_sender: false,
            ..RoomSettings::default()
        });
        let (a, mut rx_a) = member("A", 8);
        let (b, mut rx_b) = member("B", 8);
        let a_id = a.id();
        assert!(room.join(a).await.is_ok());
        assert!(room.join(b).await.is_ok());
        let _ = drain(&mut rx_a);

        let _ = room.publish(a_id, "hello".to_string()).await;
        assert!(user_seqs(&drain(&mut rx_a)).is_empty());
        assert_eq!(user_seqs(&drain(&mut rx_b)), vec![1]);
    }

    #[tokio::test]
    async fn slow_member_does_not_block_others() {
        let room = room(RoomSettings::default());
        let (slow, _rx_slow) = member("Slow", 1);
        let (fast, mut rx_fast) = member("Fast", 64);
        let fast_id = fast.id();
        assert!(room.join(fast).await.is_ok());
        assert!(room.join(slow).await.is_ok());
        let _ = drain(&mut rx_fast);

        for i in 0..10 {
            assert!(room.publish(fast_id, format!("m{i}")).await.is_ok());
        }
        assert_eq!(user_seqs(&drain(&mut rx_fast)).len(), 10);
        assert_eq!(room.member_count().await, 2);
    }

    #[tokio::test]
    async fn closed_member_is_pruned_during_fan_out() {
        let room = room(RoomSettings::default());
        let (a, _rx_a) = member("A", 8);
        let (b, rx_b) = member("B", 8);
        let a_id = a.id();
        assert!(room.join(a).await.is_ok());
        assert!(room.join(b).await.is_ok());
        drop(rx_b);

        assert!(room.publish(a_id, "x".to_string()).await.is_ok());
        assert_eq!(room.member_count().await, 1);
    }

    #[tokio::test]
    async fn non_member_cannot_publish() {
        let room = room(RoomSettings::default());
        let res = room.publish(ConnectionId::new(), "x".to_string()).await;
        assert_eq!(res, Err(ProtocolError::NotJoined));
        assert_eq!(room.last_seq().await, 0);
    }

    #[tokio::test]
    async fn closing_room_rejects_joins() {
        let room = room(RoomSettings::default());
        assert!(room.close_if_empty().await);
        let (a, _ra) = member("A", 8);
        assert_eq!(room.join(a).await, Err(JoinError::RoomClosing));
    }

    #[tokio::test]
    async fn occupied_room_does_not_close() {
        let room = room(RoomSettings::default());
        let (a, _ra) = member("A", 8);
        assert!(room.join(a).await.is_ok());
        assert!(!room.close_if_empty().await);
    }
}
