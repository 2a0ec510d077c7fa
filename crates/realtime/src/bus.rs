use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::events::RoomEvent;
use crate::room::Room;

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Publish/subscribe surface over named rooms.
///
/// Implementations must deliver, best-effort, every published event to all
/// receivers subscribed to the room at publish time. Within one room,
/// publish order is delivery order.
#[async_trait]
pub trait RoomBus: Send + Sync {
    async fn publish(&self, room: &Room, event: RoomEvent);

    async fn subscribe(&self, room: &Room) -> broadcast::Receiver<RoomEvent>;
}

/// Process-local room registry backed by one broadcast channel per room.
///
/// Senders with no remaining receivers are pruned on the next publish, so
/// idle rooms do not accumulate.
pub struct InMemoryRoomBus {
    capacity: usize,
    rooms: Mutex<HashMap<String, broadcast::Sender<RoomEvent>>>,
}

impl InMemoryRoomBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

impl Default for InMemoryRoomBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomBus for InMemoryRoomBus {
    async fn publish(&self, room: &Room, event: RoomEvent) {
        let name = room.name();
        let mut rooms = self.rooms.lock().await;

        let Some(sender) = rooms.get(&name) else {
            debug!(room = %name, "publish to room with no subscribers");
            return;
        };

        if sender.receiver_count() == 0 {
            rooms.remove(&name);
            return;
        }

        // A send only fails when every receiver is gone, which is fine for
        // best-effort delivery.
        let _ = sender.send(event);
    }

    async fn subscribe(&self, room: &Room) -> broadcast::Receiver<RoomEvent> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room.name())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}
