use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::{AppError, PermissionDenied, ValidationFailure};
use staff_cell::{StaffError, StaffProfile};
use user_cell::{UserError, UserSnapshot};

// ==============================================================================
// ROOMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    #[default]
    Direct,
    Group,
    Support,
}

impl RoomType {
    /// Direct and support rooms are unique per participant pair.
    pub fn is_paired(&self) -> bool {
        matches!(self, RoomType::Direct | RoomType::Support)
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomType::Direct => write!(f, "direct"),
            RoomType::Group => write!(f, "group"),
            RoomType::Support => write!(f, "support"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub user_ids: Vec<Uuid>,
    #[serde(rename = "type", default)]
    pub room_type: RoomType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room_key: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user_ids.contains(&user_id)
    }

    /// The counterpart in a two-party room.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_ids.len() != 2 {
            return None;
        }
        self.user_ids.iter().copied().find(|id| *id != user_id)
    }
}

/// Canonical dedup key: the sorted pair plus the room type.
pub fn room_key(user_a: Uuid, user_b: Uuid, room_type: RoomType) -> String {
    let (first, second) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{}:{}:{}", first, second, room_type)
}

// ==============================================================================
// MESSAGES
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl MessageType {
    /// Image and file messages carry an uploaded file's URL as content.
    pub fn carries_url(&self) -> bool {
        matches!(self, MessageType::Image | MessageType::File)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.iter().any(|receipt| receipt.user_id == user_id)
    }

    /// Unread for `user_id`: sent by someone else and not yet receipted.
    pub fn is_unread_for(&self, user_id: Uuid) -> bool {
        self.sender_id != user_id && !self.is_read_by(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<MessageWithSender>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

// ==============================================================================
// READ MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: Room,
    pub other_participant: Option<UserSnapshot>,
    pub other_staff_profile: Option<StaffProfile>,
    pub participants: Vec<UserSnapshot>,
    pub latest_message: Option<MessageWithSender>,
    pub unread_count: usize,
}

impl RoomSummary {
    /// Sort key: latest message time, falling back to room creation.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.latest_message
            .as_ref()
            .map(|latest| latest.message.created_at)
            .unwrap_or(self.room.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUser {
    #[serde(flatten)]
    pub user: UserSnapshot,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_typing_at: DateTime<Utc>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub other_user_id: Uuid,
    #[serde(rename = "type", default)]
    pub room_type: RoomType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupportRoomRequest {
    pub staff_profile_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRoomRequest {
    pub name: String,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRoomRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    /// Send on behalf of another participant; requires the admin capability.
    pub sender_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestMessagesRequest {
    pub room_ids: Vec<Uuid>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Room {0} not found")]
    RoomNotFound(Uuid),

    #[error("Message {0} not found")]
    MessageNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Staff profile {0} not found")]
    StaffProfileNotFound(Uuid),

    #[error("User {user_id} is not a participant of room {room_id}")]
    NotParticipant { room_id: Uuid, user_id: Uuid },

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Permission(#[from] PermissionDenied),

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Staff(#[from] StaffError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::RoomNotFound(_)
            | MessagingError::MessageNotFound(_)
            | MessagingError::UserNotFound(_)
            | MessagingError::StaffProfileNotFound(_) => AppError::NotFound(err.to_string()),
            MessagingError::NotParticipant { .. } => AppError::Forbidden(err.to_string()),
            MessagingError::Validation(failure) => failure.into(),
            MessagingError::Permission(denied) => denied.into(),
            MessagingError::User(user) => user.into(),
            MessagingError::Staff(staff) => staff.into(),
            MessagingError::Store(store) => store.into(),
        }
    }
}
