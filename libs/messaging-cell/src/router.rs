use axum::{
    routing::{get, patch, post},
    Router,
};

use user_cell::authenticated;

use crate::handlers;
use crate::state::MessagingState;
use crate::websocket::ws_handler;

pub fn messaging_routes(state: MessagingState) -> Router {
    let protected_routes = Router::new()
        .route("/rooms", get(handlers::list_my_rooms).post(handlers::create_room))
        .route("/rooms/support", post(handlers::create_support_room))
        .route("/rooms/group", post(handlers::create_group_room))
        .route("/rooms/latest", post(handlers::latest_messages))
        .route(
            "/rooms/{room_id}",
            patch(handlers::rename_room).delete(handlers::delete_room),
        )
        .route(
            "/rooms/{room_id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/rooms/{room_id}/read", post(handlers::mark_room_read))
        .route("/rooms/{room_id}/unread", get(handlers::room_unread_count))
        .route("/rooms/{room_id}/latest", get(handlers::room_latest_message))
        .route(
            "/rooms/{room_id}/typing",
            get(handlers::get_typing).post(handlers::set_typing),
        )
        .route("/messages/{message_id}", patch(handlers::edit_message))
        .route("/messages/{message_id}/read", post(handlers::mark_message_read))
        .route("/unread", get(handlers::total_unread_count))
        .route("/maintenance/cleanup-rooms", post(handlers::cleanup_duplicate_rooms))
        .route("/maintenance/cleanup-typing", post(handlers::cleanup_typing));

    let realtime_routes = Router::new().route("/ws", get(ws_handler));

    Router::new()
        .merge(realtime_routes)
        .merge(authenticated(protected_routes, &state.app))
        .with_state(state)
}
