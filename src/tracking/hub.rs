use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::OutboundEvent;

const ROOM_CAPACITY: usize = 64;

/// One broadcast room per trip, shared by every connected participant.
#[derive(Default)]
pub struct TrackingHub {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<OutboundEvent>>>,
}

impl TrackingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, trip_id: Uuid) -> broadcast::Receiver<OutboundEvent> {
        let mut rooms = self.rooms.write().await;

        rooms
            .entry(trip_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Sends `event` to everyone in the trip's room. Returns how many
    /// participants received it; zero when nobody is connected.
    pub async fn publish(&self, event: OutboundEvent) -> usize {
        let rooms = self.rooms.read().await;

        match rooms.get(&event.trip_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the room once its last participant is gone.
    pub async fn leave(&self, trip_id: Uuid) {
        let mut rooms = self.rooms.write().await;

        if let Some(sender) = rooms.get(&trip_id) {
            if sender.receiver_count() == 0 {
                rooms.remove(&trip_id);
                tracing::debug!(%trip_id, "tracking room closed");
            }
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Coordinates, TripStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn events_reach_every_participant_of_the_trip_only() {
        let hub = TrackingHub::new();
        let trip_id = Uuid::new_v4();
        let other_trip = Uuid::new_v4();

        let mut passenger = hub.join(trip_id).await;
        let mut driver = hub.join(trip_id).await;
        let mut stranger = hub.join(other_trip).await;

        let event = OutboundEvent::location(trip_id, Coordinates::new(4.05, 9.77), 0.0, Utc::now());
        assert_eq!(hub.publish(event.clone()).await, 2);

        assert_eq!(passenger.recv().await.unwrap(), event);
        assert_eq!(driver.recv().await.unwrap(), event);
        assert!(stranger.try_recv().is_err());
    }

    #[tokio::test]
    async fn room_is_dropped_after_last_leave() {
        let hub = TrackingHub::new();
        let trip_id = Uuid::new_v4();

        let first = hub.join(trip_id).await;
        let second = hub.join(trip_id).await;

        drop(first);
        hub.leave(trip_id).await;
        assert_eq!(hub.room_count().await, 1);

        drop(second);
        hub.leave(trip_id).await;
        assert_eq!(hub.room_count().await, 0);

        let event = OutboundEvent::status(trip_id, TripStatus::Started, Utc::now());
        assert_eq!(hub.publish(event).await, 0);
    }
}
