pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use router::notification_routes;
pub use services::{
    notifier_from_config, spawn_content_poller, ContentPoller, ContentService, LogNotifier, Notifier,
    SubscriberService, WebhookNotifier,
};
pub use state::NotificationState;
