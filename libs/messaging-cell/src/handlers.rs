use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};
use shared_models::error::AppError;

use crate::models::{
    CreateGroupRoomRequest, CreateRoomRequest, CreateSupportRoomRequest, EditMessageRequest,
    LatestMessagesRequest, ListMessagesQuery, RenameRoomRequest, SendMessageRequest, TypingRequest,
};
use crate::services::{MessageLog, RoomDirectory, TypingService, UnreadAggregator};
use crate::state::MessagingState;

// ==============================================================================
// ROOMS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_room(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = RoomDirectory::new(&state)
        .create_or_get_room(actor.user_id, request.other_user_id, request.room_type)
        .await?;

    Ok(Json(json!(room)))
}

#[axum::debug_handler]
pub async fn create_support_room(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateSupportRoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = RoomDirectory::new(&state)
        .create_or_get_room_with_staff_profile(actor.user_id, request.staff_profile_id)
        .await?;

    Ok(Json(json!(room)))
}

#[axum::debug_handler]
pub async fn create_group_room(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateGroupRoomRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let room = RoomDirectory::new(&state)
        .create_group_room(actor.user_id, &request.name, &request.user_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(room))))
}

#[axum::debug_handler]
pub async fn list_my_rooms(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let rooms = RoomDirectory::new(&state)
        .list_rooms_for_user(actor.user_id)
        .await?;

    Ok(Json(json!({
        "rooms": rooms,
        "total": rooms.len()
    })))
}

#[axum::debug_handler]
pub async fn rename_room(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<RenameRoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = RoomDirectory::new(&state)
        .rename_room(room_id, actor.user_id, &request.name)
        .await?;

    Ok(Json(json!(room)))
}

#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    RoomDirectory::new(&state)
        .delete_room(room_id, actor.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Latest message for each requested room the caller takes part in.
#[axum::debug_handler]
pub async fn latest_messages(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<LatestMessagesRequest>,
) -> Result<Json<Value>, AppError> {
    let directory = RoomDirectory::new(&state);
    for room_id in &request.room_ids {
        directory.get_room_for_participant(*room_id, actor.user_id).await?;
    }

    let latest = UnreadAggregator::new(&state)
        .get_latest_messages_for_rooms(&request.room_ids)
        .await?;

    Ok(Json(json!({ "latest": latest })))
}

// ==============================================================================
// MESSAGES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Value>, AppError> {
    let page = MessageLog::new(&state)
        .list_messages(room_id, actor.user_id, query)
        .await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let message = MessageLog::new(&state)
        .send_message(room_id, &actor, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(message))))
}

#[axum::debug_handler]
pub async fn mark_room_read(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let marked = MessageLog::new(&state)
        .mark_all_messages_as_read(room_id, actor.user_id)
        .await?;

    Ok(Json(json!({ "roomId": room_id, "marked": marked })))
}

#[axum::debug_handler]
pub async fn room_unread_count(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let count = UnreadAggregator::new(&state)
        .get_unread_message_count(room_id, actor.user_id)
        .await?;

    Ok(Json(json!({ "roomId": room_id, "unreadCount": count })))
}

#[axum::debug_handler]
pub async fn room_latest_message(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    RoomDirectory::new(&state)
        .get_room_for_participant(room_id, actor.user_id)
        .await?;

    let latest = UnreadAggregator::new(&state)
        .get_latest_message_for_room(room_id)
        .await?;

    Ok(Json(json!({ "roomId": room_id, "latestMessage": latest })))
}

#[axum::debug_handler]
pub async fn mark_message_read(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let changed = MessageLog::new(&state)
        .mark_message_as_read(message_id, actor.user_id)
        .await?;

    Ok(Json(json!({ "messageId": message_id, "changed": changed })))
}

#[axum::debug_handler]
pub async fn edit_message(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(message_id): Path<Uuid>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let message = MessageLog::new(&state)
        .edit_message(message_id, actor.user_id, &request.content)
        .await?;

    Ok(Json(json!(message)))
}

#[axum::debug_handler]
pub async fn total_unread_count(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let total = UnreadAggregator::new(&state)
        .get_total_unread_count(actor.user_id)
        .await?;

    Ok(Json(json!({ "unreadCount": total })))
}

// ==============================================================================
// TYPING
// ==============================================================================

#[axum::debug_handler]
pub async fn set_typing(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<TypingRequest>,
) -> Result<StatusCode, AppError> {
    TypingService::new(&state)
        .set_typing_status(room_id, actor.user_id, request.is_typing)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_typing(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    RoomDirectory::new(&state)
        .get_room_for_participant(room_id, actor.user_id)
        .await?;

    let users = TypingService::new(&state)
        .get_typing_users(room_id, Some(actor.user_id))
        .await?;

    Ok(Json(json!({ "roomId": room_id, "typing": users })))
}

// ==============================================================================
// MAINTENANCE
// ==============================================================================

#[axum::debug_handler]
pub async fn cleanup_duplicate_rooms(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    actor.require(Capability::RunMaintenance)?;

    let removed = RoomDirectory::new(&state).cleanup_duplicate_rooms().await?;

    Ok(Json(json!({ "removed": removed })))
}

#[axum::debug_handler]
pub async fn cleanup_typing(
    State(state): State<MessagingState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    actor.require(Capability::RunMaintenance)?;

    let removed = TypingService::new(&state).cleanup_old_typing_statuses().await;

    Ok(Json(json!({ "removed": removed })))
}
