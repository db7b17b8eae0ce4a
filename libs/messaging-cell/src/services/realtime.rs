use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// Invalidation notice. Clients refetch the named view on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RealtimeEvent {
    RoomsChanged { room_id: Uuid },
    MessagesChanged { room_id: Uuid },
    ReadStateChanged { room_id: Uuid, user_id: Uuid },
    TypingChanged { room_id: Uuid },
    /// The subscriber fell behind and should refetch everything.
    Resync,
}

/// Per-user broadcast channels. A user with several open sockets shares one
/// channel; channels without receivers are dropped on release.
#[derive(Default)]
pub struct RealtimeHub {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<RealtimeEvent>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);

        debug!("User {} subscribed to realtime events", user_id);
        sender.subscribe()
    }

    /// Drops the user's channel once its last receiver is gone.
    pub async fn release(&self, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&user_id)
            .map(|sender| sender.receiver_count() == 0)
            .unwrap_or(false)
        {
            channels.remove(&user_id);
            debug!("Removed realtime channel for user {}", user_id);
        }
    }

    /// Delivers the event to every listed user that is connected. Returns the
    /// number of users reached.
    pub async fn publish(&self, user_ids: &[Uuid], event: RealtimeEvent) -> usize {
        let channels = self.channels.read().await;
        let mut delivered = 0;

        for user_id in user_ids {
            if let Some(sender) = channels.get(user_id) {
                if sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        debug!("Published {:?} to {} of {} users", event, delivered, user_ids.len());
        delivered
    }

    pub async fn connected_users(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_reach_only_targeted_users() {
        let hub = RealtimeHub::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room_id = Uuid::new_v4();

        let mut alice_rx = hub.subscribe(alice).await;
        let mut bob_rx = hub.subscribe(bob).await;

        let reached = hub
            .publish(&[alice, Uuid::new_v4()], RealtimeEvent::TypingChanged { room_id })
            .await;

        assert_eq!(reached, 1);
        assert_eq!(alice_rx.recv().await.unwrap(), RealtimeEvent::TypingChanged { room_id });
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_keeps_channels_with_live_receivers() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();

        let first = hub.subscribe(user).await;
        let second = hub.subscribe(user).await;
        drop(first);
        hub.release(user).await;
        assert_eq!(hub.connected_users().await, 1);

        drop(second);
        hub.release(user).await;
        assert_eq!(hub.connected_users().await, 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let room_id = Uuid::nil();
        let value = serde_json::to_value(RealtimeEvent::MessagesChanged { room_id }).unwrap();
        assert_eq!(value, json!({"type": "messages_changed", "roomId": room_id}));
    }
}
