use std::sync::Arc;

use axum::extract::FromRef;
use tokio::sync::Mutex;

use shared_utils::AppState;

use crate::services::{RealtimeHub, TypingPresence};

/// Router state for the messaging cell: the shared application handles plus
/// the process-local realtime hub and typing presence.
#[derive(Clone)]
pub struct MessagingState {
    pub app: AppState,
    pub realtime: Arc<RealtimeHub>,
    pub typing: Arc<TypingPresence>,
    /// Serializes message writes so per-room timestamps stay strictly
    /// increasing and receipt appends are not lost.
    pub write_lock: Arc<Mutex<()>>,
}

impl MessagingState {
    pub fn new(app: AppState) -> Self {
        let typing = TypingPresence::from_config(&app.config, app.clock.clone());

        Self {
            realtime: Arc::new(RealtimeHub::new()),
            typing: Arc::new(typing),
            write_lock: Arc::new(Mutex::new(())),
            app,
        }
    }
}

impl FromRef<MessagingState> for AppState {
    fn from_ref(state: &MessagingState) -> Self {
        state.app.clone()
    }
}
