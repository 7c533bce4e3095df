//! Concurrent room storage with lazy creation and empty-room teardown.
//!
//! [`RoomRegistry`] keeps every live room in a `RwLock<HashMap<...>>`.
//! Lookups share the read lock; creation and removal take the write lock.
//! Lock order is always registry map first, then room, never the reverse.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use super::{Room, RoomId, RoomSettings};

/// Map of room id to live [`Room`].
///
/// # Concurrency
///
/// - [`RoomRegistry::get_or_create`] is double-checked under the write lock,
///   so concurrent callers for the same id observe one instance.
/// - [`RoomRegistry::remove_if_empty`] marks the room closing under both
///   locks before dropping it from the map; a join racing the removal gets
///   [`crate::error::JoinError::RoomClosing`] and retries on a fresh room.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    settings: RoomSettings,
    empty_grace: Duration,
    rooms_created: AtomicU64,
}

impl RoomRegistry {
    /// Creates an empty registry. Rooms it creates use `settings`; empty
    /// rooms linger for `empty_grace` before removal.
    #[must_use]
    pub fn new(settings: RoomSettings, empty_grace: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            settings,
            empty_grace,
            rooms_created: AtomicU64::new(0),
        }
    }

    /// Returns the room for `room_id`, creating it if needed.
    pub async fn get_or_create(&self, room_id: &RoomId) -> Arc<Room> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Arc::clone(room);
        }

        let mut map = self.rooms.write().await;
        let room = map.entry(room_id.clone()).or_insert_with(|| {
            self.rooms_created.fetch_add(1, Ordering::Relaxed);
            tracing::info!(room = %room_id, "room created");
            Arc::new(Room::new(room_id.clone(), self.settings))
        });
        Arc::clone(room)
    }

    /// Returns the room for `room_id` if it exists.
    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).map(Arc::clone)
    }

    /// Removes the room if it has no members. Returns `true` if removed.
    pub async fn remove_if_empty(&self, room_id: &RoomId) -> bool {
        let mut map = self.rooms.write().await;
        let Some(room) = map.get(room_id) else {
            return false;
        };
        if !room.close_if_empty().await {
            return false;
        }
        map.remove(room_id);
        tracing::info!(room = %room_id, "room removed");
        true
    }

    /// Schedules [`RoomRegistry::remove_if_empty`] after the grace period.
    ///
    /// A member that rejoins within the grace period keeps the room alive.
    pub async fn release(self: &Arc<Self>, room_id: RoomId) {
        if self.empty_grace.is_zero() {
            self.remove_if_empty(&room_id).await;
            return;
        }
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registry.empty_grace).await;
            registry.remove_if_empty(&room_id).await;
        });
    }

    /// Returns every live room, ordered by id.
    pub async fn list(&self) -> Vec<Arc<Room>> {
        let map = self.rooms.read().await;
        let mut rooms: Vec<Arc<Room>> = map.values().map(Arc::clone).collect();
        rooms.sort_by(|a, b| a.id().cmp(b.id()));
        rooms
    }

    /// Returns the number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns `true` if no room is live.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Total number of rooms created since startup.
    #[must_use]
    pub fn rooms_created(&self) -> u64 {
        self.rooms_created.load(Ordering::Relaxed)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomSettings::default(), Duration::ZERO)
    }
}
