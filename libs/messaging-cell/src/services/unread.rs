use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, Query, SortOrder};
use user_cell::UserService;

use crate::models::{Message, MessageWithSender, MessagingError, Room};
use crate::services::rooms::RoomDirectory;
use crate::state::MessagingState;

/// Read-side aggregation over the message log. Counts are derived by
/// scanning receipts on every call; nothing is cached.
pub struct UnreadAggregator {
    state: MessagingState,
    users: UserService,
}

impl UnreadAggregator {
    pub fn new(state: &MessagingState) -> Self {
        Self {
            users: UserService::new(&state.app),
            state: state.clone(),
        }
    }

    /// Unread messages in the room for the user; 0 when the user is not a
    /// participant.
    pub async fn get_unread_message_count(&self, room_id: Uuid, user_id: Uuid) -> Result<usize, MessagingError> {
        let room = RoomDirectory::new(&self.state).get_room(room_id).await?;
        if !room.has_participant(user_id) {
            return Ok(0);
        }
        self.count_unread(room.id, user_id).await
    }

    pub(crate) async fn count_unread(&self, room_id: Uuid, user_id: Uuid) -> Result<usize, MessagingError> {
        let query = Query::new()
            .eq("roomId", room_id.to_string())
            .neq("senderId", user_id.to_string());
        let messages: Vec<Message> = decode_all(self.state.app.store.find(tables::MESSAGES, &query).await?)?;

        Ok(messages.iter().filter(|message| message.is_unread_for(user_id)).count())
    }

    /// Sum of unread counts over every room the user takes part in.
    pub async fn get_total_unread_count(&self, user_id: Uuid) -> Result<usize, MessagingError> {
        debug!("Computing total unread for user {}", user_id);

        let rooms: Vec<Room> = decode_all(
            self.state
                .app
                .store
                .find(tables::ROOMS, &Query::new().contains("userIds", user_id.to_string()))
                .await?,
        )?;

        let mut total = 0;
        for room in rooms {
            total += self.count_unread(room.id, user_id).await?;
        }
        Ok(total)
    }

    pub async fn get_latest_message_for_room(
        &self,
        room_id: Uuid,
    ) -> Result<Option<MessageWithSender>, MessagingError> {
        RoomDirectory::new(&self.state).get_room(room_id).await?;
        self.latest_message_for_room(room_id).await
    }

    /// Latest message per room; rooms without messages map to `None`.
    pub async fn get_latest_messages_for_rooms(
        &self,
        room_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Option<MessageWithSender>>, MessagingError> {
        let mut latest = HashMap::with_capacity(room_ids.len());
        for room_id in room_ids {
            latest.insert(*room_id, self.latest_message_for_room(*room_id).await?);
        }
        Ok(latest)
    }

    pub(crate) async fn latest_message_for_room(
        &self,
        room_id: Uuid,
    ) -> Result<Option<MessageWithSender>, MessagingError> {
        let query = Query::new()
            .eq("roomId", room_id.to_string())
            .order_by("createdAt", SortOrder::Desc);

        let Some(document) = self.state.app.store.find_one(tables::MESSAGES, &query).await? else {
            return Ok(None);
        };
        let message: Message = decode(document)?;
        let sender = self
            .users
            .find_by_id(message.sender_id)
            .await?
            .map(|user| user.snapshot());

        Ok(Some(MessageWithSender { message, sender }))
    }
}
