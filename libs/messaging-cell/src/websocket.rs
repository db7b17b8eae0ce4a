use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::jwt::validate_token;
use shared_utils::Clock;
use user_cell::UserService;

use crate::services::RealtimeEvent;
use crate::state::MessagingState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Upgrades to a socket that streams the caller's realtime invalidations.
/// Browsers cannot set headers on upgrade, so the token comes as a query
/// parameter.
pub async fn ws_handler(
    State(state): State<MessagingState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let identity = validate_token(
        &params.token,
        &state.app.config.supabase_jwt_secret,
        state.app.clock.now(),
    )?;
    let profile = UserService::new(&state.app).ensure_user(&identity).await?;

    info!("Realtime connection opened for user {}", profile.id);
    Ok(ws.on_upgrade(move |socket| handle_socket(state, profile.id, socket)))
}

async fn handle_socket(state: MessagingState, user_id: Uuid, socket: WebSocket) {
    let mut events = state.realtime.subscribe(user_id).await;
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("User {} lagged {} realtime events, requesting resync", user_id, skipped);
                    RealtimeEvent::Resync
                }
                Err(RecvError::Closed) => break,
            };

            let Ok(payload) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames carry nothing but keepalives; watch for close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if let Message::Close(_) = frame {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            send_task.abort();
            // The receiver must be dropped before release can see it gone.
            let _ = send_task.await;
        }
    }

    state.realtime.release(user_id).await;
    debug!("Realtime connection closed for user {}", user_id);
}
