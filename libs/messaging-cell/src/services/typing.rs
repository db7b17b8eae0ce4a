use tracing::{debug, info};
use uuid::Uuid;

use user_cell::UserService;

use crate::models::{MessagingError, TypingUser};
use crate::services::realtime::RealtimeEvent;
use crate::services::rooms::RoomDirectory;
use crate::state::MessagingState;

pub struct TypingService {
    state: MessagingState,
    rooms: RoomDirectory,
    users: UserService,
}

impl TypingService {
    pub fn new(state: &MessagingState) -> Self {
        Self {
            rooms: RoomDirectory::new(state),
            users: UserService::new(&state.app),
            state: state.clone(),
        }
    }

    pub async fn set_typing_status(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    ) -> Result<(), MessagingError> {
        let room = self.rooms.get_room_for_participant(room_id, user_id).await?;

        let was_typing = self.state.typing.set(room_id, user_id, is_typing).await;
        debug!("User {} typing={} in room {}", user_id, is_typing, room_id);

        // A heartbeat while already typing changes nothing observers see.
        if was_typing != is_typing {
            self.state
                .realtime
                .publish(&room.user_ids, RealtimeEvent::TypingChanged { room_id })
                .await;
        }
        Ok(())
    }

    pub async fn start_typing(&self, room_id: Uuid, user_id: Uuid) -> Result<(), MessagingError> {
        self.set_typing_status(room_id, user_id, true).await
    }

    pub async fn stop_typing(&self, room_id: Uuid, user_id: Uuid) -> Result<(), MessagingError> {
        self.set_typing_status(room_id, user_id, false).await
    }

    /// Users typing in the room within the display window, freshest first.
    pub async fn get_typing_users(
        &self,
        room_id: Uuid,
        exclude_user: Option<Uuid>,
    ) -> Result<Vec<TypingUser>, MessagingError> {
        self.rooms.get_room(room_id).await?;

        let typing = self.state.typing.typing_in_room(room_id, exclude_user).await;
        let user_ids: Vec<Uuid> = typing.iter().map(|(user_id, _)| *user_id).collect();
        let snapshots = self.users.snapshots(&user_ids).await?;

        Ok(typing
            .into_iter()
            .filter_map(|(user_id, last_typing_at)| {
                snapshots.get(&user_id).cloned().map(|user| TypingUser {
                    user,
                    last_typing_at,
                })
            })
            .collect())
    }

    pub async fn cleanup_old_typing_statuses(&self) -> usize {
        let removed = self.state.typing.cleanup().await;
        if removed > 0 {
            info!("Removed {} stale typing entries", removed);
        }
        removed
    }
}
