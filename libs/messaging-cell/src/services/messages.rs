use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, Query, SortOrder, StoreError};
use shared_models::auth::{Actor, Capability};
use shared_models::error::{PermissionDenied, ValidationFailure};
use shared_utils::validation::{non_empty_trimmed, validate_url};
use user_cell::UserService;

use crate::models::{
    ListMessagesQuery, Message, MessagePage, MessageType, MessageWithSender, MessagingError, ReadReceipt,
    Room, SendMessageRequest,
};
use crate::services::realtime::RealtimeEvent;
use crate::services::rooms::{require_participant, RoomDirectory};
use crate::state::MessagingState;

const DEFAULT_PAGE_SIZE: usize = 20;

/// Append-only per-room message sequence with read receipts.
pub struct MessageLog {
    state: MessagingState,
    rooms: RoomDirectory,
    users: UserService,
}

impl MessageLog {
    pub fn new(state: &MessagingState) -> Self {
        Self {
            rooms: RoomDirectory::new(state),
            users: UserService::new(&state.app),
            state: state.clone(),
        }
    }

    /// Appends a message from the actor, or from `request.sender_id` when
    /// the actor may send on behalf of others.
    pub async fn send_message(
        &self,
        room_id: Uuid,
        actor: &Actor,
        request: SendMessageRequest,
    ) -> Result<Message, MessagingError> {
        let sender_id = request.sender_id.unwrap_or(actor.user_id);
        if sender_id == actor.user_id {
            actor.require(Capability::SendMessages)?;
        } else {
            actor.require(Capability::SendOnBehalf)?;
        }
        debug!("User {} sending message to room {} as {}", actor.user_id, room_id, sender_id);

        let room = self.rooms.get_room(room_id).await?;
        if self.users.find_by_id(sender_id).await?.is_none() {
            return Err(MessagingError::UserNotFound(sender_id));
        }
        require_participant(&room, sender_id)?;

        let content = validate_content(request.message_type, &request.content)?;

        let message = {
            let _guard = self.state.write_lock.lock().await;
            let created_at = self.next_timestamp(room_id).await?;

            let stored = self
                .state
                .app
                .store
                .insert(
                    tables::MESSAGES,
                    json!({
                        "roomId": room_id,
                        "senderId": sender_id,
                        "content": content,
                        "messageType": request.message_type,
                        "readBy": [],
                        "createdAt": created_at.timestamp_millis(),
                    }),
                )
                .await?;
            decode::<Message>(stored)?
        };

        self.state
            .app
            .store
            .update(
                tables::ROOMS,
                &room_id.to_string(),
                json!({ "updatedAt": message.created_at.timestamp_millis() }),
            )
            .await?;

        let was_typing = self.state.typing.set(room_id, sender_id, false).await;

        info!("Message {} sent to room {} by {}", message.id, room_id, sender_id);
        self.notify(&room, RealtimeEvent::MessagesChanged { room_id }).await;
        self.notify(&room, RealtimeEvent::RoomsChanged { room_id }).await;
        if was_typing {
            self.notify(&room, RealtimeEvent::TypingChanged { room_id }).await;
        }

        Ok(message)
    }

    /// Newest-first page. The cursor is the opaque `next_cursor` of the
    /// previous page.
    pub async fn list_messages(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        query: ListMessagesQuery,
    ) -> Result<MessagePage, MessagingError> {
        self.rooms.get_room_for_participant(room_id, user_id).await?;

        let max = self.state.app.config.message_page_max.max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max);

        let mut lookup = Query::new()
            .eq("roomId", room_id.to_string())
            .order_by("createdAt", SortOrder::Desc)
            .limit(limit.saturating_add(1));
        if let Some(cursor) = query.cursor.as_deref() {
            lookup = lookup.lt("createdAt", decode_cursor(cursor)?);
        }

        let mut messages: Vec<Message> =
            decode_all(self.state.app.store.find(tables::MESSAGES, &lookup).await?)?;
        let has_more = messages.len() > limit;
        messages.truncate(limit);

        let next_cursor = if has_more {
            messages.last().map(|oldest| encode_cursor(oldest.created_at))
        } else {
            None
        };

        let sender_ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
        let snapshots = self.users.snapshots(&sender_ids).await?;
        let messages = messages
            .into_iter()
            .map(|message| MessageWithSender {
                sender: snapshots.get(&message.sender_id).cloned(),
                message,
            })
            .collect();

        Ok(MessagePage {
            messages,
            next_cursor,
            has_more,
        })
    }

    /// Adds the reader's receipt. Returns false when nothing changed: the
    /// reader sent the message or has already read it.
    pub async fn mark_message_as_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<bool, MessagingError> {
        let _guard = self.state.write_lock.lock().await;

        let message = self.get_message(message_id).await?;
        let room = self.rooms.get_room_for_participant(message.room_id, reader_id).await?;

        if !self.append_receipt(&message, reader_id).await? {
            return Ok(false);
        }

        self.notify(
            &room,
            RealtimeEvent::ReadStateChanged {
                room_id: room.id,
                user_id: reader_id,
            },
        )
        .await;
        Ok(true)
    }

    /// Marks every message from others in the room as read. Returns how many
    /// receipts were added.
    pub async fn mark_all_messages_as_read(&self, room_id: Uuid, reader_id: Uuid) -> Result<usize, MessagingError> {
        let _guard = self.state.write_lock.lock().await;

        let room = self.rooms.get_room_for_participant(room_id, reader_id).await?;
        let query = Query::new()
            .eq("roomId", room_id.to_string())
            .neq("senderId", reader_id.to_string());
        let messages: Vec<Message> = decode_all(self.state.app.store.find(tables::MESSAGES, &query).await?)?;

        let mut marked = 0;
        for message in &messages {
            if self.append_receipt(message, reader_id).await? {
                marked += 1;
            }
        }

        if marked > 0 {
            debug!("Marked {} messages read in room {} for {}", marked, room_id, reader_id);
            self.notify(
                &room,
                RealtimeEvent::ReadStateChanged {
                    room_id,
                    user_id: reader_id,
                },
            )
            .await;
        }
        Ok(marked)
    }

    /// Replaces the content of the caller's own message.
    pub async fn edit_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let message = self.get_message(message_id).await?;
        if message.sender_id != user_id {
            return Err(PermissionDenied("Only the sender can edit a message".to_string()).into());
        }
        if message.message_type == MessageType::System {
            return Err(ValidationFailure("System messages cannot be edited".to_string()).into());
        }
        let room = self.rooms.get_room_for_participant(message.room_id, user_id).await?;
        let content = validate_content(message.message_type, content)?;

        let now = self.state.app.clock.now().timestamp_millis();
        let updated = self
            .state
            .app
            .store
            .update(
                tables::MESSAGES,
                &message_id.to_string(),
                json!({
                    "content": content,
                    "editedAt": now,
                    "updatedAt": now,
                }),
            )
            .await?
            .ok_or(MessagingError::MessageNotFound(message_id))?;

        self.notify(&room, RealtimeEvent::MessagesChanged { room_id: room.id }).await;
        Ok(decode(updated)?)
    }

    pub async fn get_message(&self, message_id: Uuid) -> Result<Message, MessagingError> {
        self.state
            .app
            .store
            .get(tables::MESSAGES, &message_id.to_string())
            .await?
            .map(decode)
            .transpose()?
            .ok_or(MessagingError::MessageNotFound(message_id))
    }

    async fn append_receipt(&self, message: &Message, reader_id: Uuid) -> Result<bool, StoreError> {
        if message.sender_id == reader_id || message.is_read_by(reader_id) {
            return Ok(false);
        }

        let mut read_by = message.read_by.clone();
        read_by.push(ReadReceipt {
            user_id: reader_id,
            read_at: self.state.app.clock.now(),
        });

        self.state
            .app
            .store
            .update(
                tables::MESSAGES,
                &message.id.to_string(),
                json!({ "readBy": read_by }),
            )
            .await?;
        Ok(true)
    }

    /// Creation time for the next message: now, bumped past the room's
    /// latest message so `createdAt` is strictly increasing per room.
    async fn next_timestamp(&self, room_id: Uuid) -> Result<DateTime<Utc>, MessagingError> {
        let now = self.state.app.clock.now();
        let latest = self
            .state
            .app
            .store
            .find_one(
                tables::MESSAGES,
                &Query::new()
                    .eq("roomId", room_id.to_string())
                    .order_by("createdAt", SortOrder::Desc),
            )
            .await?
            .map(decode::<Message>)
            .transpose()?;

        let now_ms = now.timestamp_millis();
        let stamp = match latest {
            Some(latest) if latest.created_at.timestamp_millis() >= now_ms => {
                latest.created_at.timestamp_millis() + 1
            }
            _ => now_ms,
        };

        DateTime::<Utc>::from_timestamp_millis(stamp)
            .ok_or_else(|| ValidationFailure("Timestamp out of range".to_string()).into())
    }

    async fn notify(&self, room: &Room, event: RealtimeEvent) {
        self.state.realtime.publish(&room.user_ids, event).await;
    }
}

fn validate_content(message_type: MessageType, content: &str) -> Result<String, ValidationFailure> {
    let content = non_empty_trimmed("content", content)?;
    if message_type.carries_url() {
        return validate_url("content", &content);
    }
    Ok(content)
}

pub fn encode_cursor(created_at: DateTime<Utc>) -> String {
    URL_SAFE_NO_PAD.encode(created_at.timestamp_millis().to_string())
}

pub fn decode_cursor(cursor: &str) -> Result<i64, ValidationFailure> {
    URL_SAFE_NO_PAD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| ValidationFailure("Invalid cursor".to_string()))
}
