use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::Clock;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TypingEntry {
    is_typing: bool,
    last_typing_at: DateTime<Utc>,
}

/// Ephemeral "who is typing" state, one entry per (room, user). Entries
/// older than the display window are hidden; entries older than the GC
/// window are removed by `cleanup`.
pub struct TypingPresence {
    entries: RwLock<HashMap<(Uuid, Uuid), TypingEntry>>,
    clock: Arc<dyn Clock>,
    display_window: Duration,
    gc_window: Duration,
}

impl TypingPresence {
    pub fn new(clock: Arc<dyn Clock>, display_window: Duration, gc_window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            display_window,
            gc_window,
        }
    }

    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            clock,
            Duration::seconds(config.typing_display_window_secs),
            Duration::seconds(config.typing_gc_window_secs),
        )
    }

    /// Upserts the entry; the latest signal wins. Returns the previous flag.
    pub async fn set(&self, room_id: Uuid, user_id: Uuid, is_typing: bool) -> bool {
        let entry = TypingEntry {
            is_typing,
            last_typing_at: self.clock.now(),
        };

        let previous = self.entries.write().await.insert((room_id, user_id), entry);
        previous.map(|e| e.is_typing).unwrap_or(false)
    }

    /// Users currently typing in the room, freshest first.
    pub async fn typing_in_room(
        &self,
        room_id: Uuid,
        exclude_user: Option<Uuid>,
    ) -> Vec<(Uuid, DateTime<Utc>)> {
        let cutoff = self.clock.now() - self.display_window;
        let entries = self.entries.read().await;

        let mut typing: Vec<(Uuid, DateTime<Utc>)> = entries
            .iter()
            .filter(|((entry_room, user_id), entry)| {
                *entry_room == room_id
                    && Some(*user_id) != exclude_user
                    && entry.is_typing
                    && entry.last_typing_at >= cutoff
            })
            .map(|((_, user_id), entry)| (*user_id, entry.last_typing_at))
            .collect();

        typing.sort_by(|a, b| b.1.cmp(&a.1));
        typing
    }

    /// Removes entries past the GC window. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let cutoff = self.clock.now() - self.gc_window;
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, entry| entry.last_typing_at >= cutoff);
        before - entries.len()
    }

    pub async fn clear_room(&self, room_id: Uuid) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(entry_room, _), _| *entry_room != room_id);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Runs `cleanup` on a fixed cadence until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.cleanup().await;
                if removed > 0 {
                    debug!("Typing sweeper removed {} stale entries", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_utils::ManualClock;

    fn presence(clock: &ManualClock) -> TypingPresence {
        TypingPresence::new(Arc::new(clock.clone()), Duration::seconds(10), Duration::seconds(30))
    }

    #[tokio::test]
    async fn stale_entries_are_hidden_then_collected() {
        let clock = ManualClock::default();
        let presence = presence(&clock);
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        presence.set(room, user, true).await;
        assert_eq!(presence.typing_in_room(room, None).await.len(), 1);

        clock.advance(Duration::seconds(11));
        assert!(presence.typing_in_room(room, None).await.is_empty());
        assert_eq!(presence.cleanup().await, 0);

        clock.advance(Duration::seconds(20));
        assert_eq!(presence.cleanup().await, 1);
        assert!(presence.is_empty().await);
    }

    #[tokio::test]
    async fn latest_signal_wins_and_exclusion_applies() {
        let clock = ManualClock::default();
        let presence = presence(&clock);
        let room = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        presence.set(room, alice, true).await;
        presence.set(room, bob, true).await;
        assert!(presence.set(room, bob, false).await);

        let typing = presence.typing_in_room(room, Some(alice)).await;
        assert!(typing.is_empty());
        assert_eq!(presence.len().await, 2);

        assert_eq!(presence.clear_room(room).await, 2);
    }
}
