pub mod content;
pub mod notifier;
pub mod poller;

pub use content::{ContentService, SubscriberService};
pub use notifier::{notifier_from_config, LogNotifier, Notifier, WebhookNotifier};
pub use poller::{spawn_content_poller, ContentPoller};
