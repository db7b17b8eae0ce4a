use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shared_database::{decode, decode_all, tables, DocumentStore, Query, SortOrder};
use shared_utils::Clock;

use crate::models::{
    ContentItem, ContentKind, ContentNotice, KindReport, NotificationCursor, NotificationError, PollReport,
};
use crate::services::content::SubscriberService;
use crate::services::notifier::Notifier;
use crate::state::NotificationState;

/// Detects newly published content by comparing table sizes against the
/// last-seen counts in `notification_cursors`, and hands each new item to the
/// notifier once.
pub struct ContentPoller {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    subscribers: SubscriberService,
}

impl ContentPoller {
    pub fn new(state: &NotificationState) -> Self {
        Self {
            store: state.app.store.clone(),
            clock: state.app.clock.clone(),
            notifier: state.notifier.clone(),
            subscribers: SubscriberService::new(&state.app),
        }
    }

    pub async fn poll_once(&self) -> Result<PollReport, NotificationError> {
        let recipients = self.subscribers.list_emails().await?;
        let mut report = PollReport {
            recipients: recipients.len(),
            ..Default::default()
        };

        for kind in ContentKind::ALL {
            report.kinds.push(self.poll_kind(kind, &recipients).await?);
        }

        debug!("Content poll finished: {} notices sent", report.notified());
        Ok(report)
    }

    async fn poll_kind(&self, kind: ContentKind, recipients: &[String]) -> Result<KindReport, NotificationError> {
        let current = self.store.count(kind.table(), &Query::new()).await?;
        let mut report = KindReport {
            kind,
            previous_count: None,
            current_count: current,
            notified: 0,
            failed: 0,
        };

        // First sighting only records a baseline; existing content is not news.
        let Some(cursor) = self.load_cursor(kind).await? else {
            self.create_cursor(kind, current).await?;
            info!("Recorded baseline of {} {}", current, kind);
            return Ok(report);
        };

        let previous = cursor.last_seen_count;
        report.previous_count = Some(previous);

        if current < previous {
            warn!("{} shrank from {} to {}, resetting baseline", kind, previous, current);
            self.save_cursor(&cursor, current).await?;
            return Ok(report);
        }
        if current == previous {
            return Ok(report);
        }

        if recipients.is_empty() {
            debug!("{} new {} but no subscribers", current - previous, kind);
            self.save_cursor(&cursor, current).await?;
            return Ok(report);
        }

        let fresh = self.newest_items(kind, current - previous).await?;
        for item in &fresh {
            let notice = ContentNotice {
                kind,
                item: item.clone(),
            };
            match self.notifier.notify(&notice, recipients).await {
                Ok(()) => report.notified += 1,
                Err(err) => {
                    error!("Failed to notify subscribers about {} {}: {:#}", kind, item.id, err);
                    report.failed = fresh.len() - report.notified;
                    break;
                }
            }
        }

        // Undelivered items stay ahead of the cursor and are retried next poll.
        self.save_cursor(&cursor, previous + report.notified).await?;
        Ok(report)
    }

    /// The `count` most recent items, oldest first.
    async fn newest_items(&self, kind: ContentKind, count: usize) -> Result<Vec<ContentItem>, NotificationError> {
        let query = Query::new().order_by("createdAt", SortOrder::Desc).limit(count);
        let mut items: Vec<ContentItem> = decode_all(self.store.find(kind.table(), &query).await?)?;
        items.reverse();
        Ok(items)
    }

    async fn load_cursor(&self, kind: ContentKind) -> Result<Option<NotificationCursor>, NotificationError> {
        Ok(self
            .store
            .find_one(tables::NOTIFICATION_CURSORS, &Query::new().eq("table", kind.table()))
            .await?
            .map(decode)
            .transpose()?)
    }

    async fn create_cursor(&self, kind: ContentKind, count: usize) -> Result<(), NotificationError> {
        self.store
            .insert_if_absent(
                tables::NOTIFICATION_CURSORS,
                "table",
                json!({
                    "table": kind.table(),
                    "lastSeenCount": count,
                    "updatedAt": self.clock.now().timestamp_millis(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn save_cursor(&self, cursor: &NotificationCursor, count: usize) -> Result<(), NotificationError> {
        self.store
            .update(
                tables::NOTIFICATION_CURSORS,
                &cursor.id.to_string(),
                json!({
                    "lastSeenCount": count,
                    "updatedAt": self.clock.now().timestamp_millis(),
                }),
            )
            .await?;
        Ok(())
    }
}

/// Polls on a fixed cadence. The first tick fires immediately, which records
/// baselines at startup.
pub fn spawn_content_poller(state: NotificationState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poller = ContentPoller::new(&state);
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = poller.poll_once().await {
                error!("Content poll failed: {}", err);
            }
        }
    })
}
