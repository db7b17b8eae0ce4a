use std::sync::Arc;

use axum::extract::FromRef;

use shared_utils::AppState;

use crate::services::{notifier_from_config, Notifier};

#[derive(Clone)]
pub struct NotificationState {
    pub app: AppState,
    pub notifier: Arc<dyn Notifier>,
}

impl NotificationState {
    pub fn new(app: AppState) -> Self {
        let notifier = notifier_from_config(&app.config);
        Self::with_notifier(app, notifier)
    }

    pub fn with_notifier(app: AppState, notifier: Arc<dyn Notifier>) -> Self {
        Self { app, notifier }
    }
}

impl FromRef<NotificationState> for AppState {
    fn from_ref(state: &NotificationState) -> Self {
        state.app.clone()
    }
}
