use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, DocumentStore, Query, SortOrder};
use shared_models::auth::{Actor, Capability};
use shared_utils::validation::{non_empty_trimmed, validate_email};
use shared_utils::{AppState, Clock};

use crate::models::{ContentItem, ContentKind, NotificationError, PublishContentRequest, Subscriber};

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

pub struct ContentService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ContentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    pub async fn publish(
        &self,
        actor: &Actor,
        kind: ContentKind,
        request: PublishContentRequest,
    ) -> Result<ContentItem, NotificationError> {
        debug!("User {} publishing to {}", actor.user_id, kind);
        actor.require(Capability::PublishContent)?;

        let title = non_empty_trimmed("title", &request.title)?;
        let body = non_empty_trimmed("body", &request.body)?;

        let stored = self
            .store
            .insert(
                kind.table(),
                json!({
                    "title": title,
                    "body": body,
                    "authorId": actor.user_id,
                    "createdAt": self.clock.now().timestamp_millis(),
                }),
            )
            .await?;

        let item: ContentItem = decode(stored)?;
        info!("Published {} {} '{}'", kind, item.id, item.title);
        Ok(item)
    }

    /// Newest first.
    pub async fn list(&self, kind: ContentKind, limit: Option<usize>) -> Result<Vec<ContentItem>, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let query = Query::new().order_by("createdAt", SortOrder::Desc).limit(limit);

        Ok(decode_all(self.store.find(kind.table(), &query).await?)?)
    }

    pub async fn get(&self, kind: ContentKind, id: Uuid) -> Result<ContentItem, NotificationError> {
        self.store
            .get(kind.table(), &id.to_string())
            .await?
            .map(decode)
            .transpose()?
            .ok_or(NotificationError::ContentNotFound(id))
    }
}

pub struct SubscriberService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl SubscriberService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Adds the email to the mailing list. Returns the subscriber and whether
    /// it was newly created.
    pub async fn subscribe(&self, email: &str) -> Result<(Subscriber, bool), NotificationError> {
        let email = validate_email(email)?;
        debug!("Subscribing {}", email);

        let inserted = self
            .store
            .insert_if_absent(
                tables::SUBSCRIBERS,
                "email",
                json!({
                    "email": email,
                    "createdAt": self.clock.now().timestamp_millis(),
                }),
            )
            .await?;

        let subscriber: Subscriber = decode(inserted.document)?;
        if inserted.created {
            info!("New subscriber {}", subscriber.id);
        }
        Ok((subscriber, inserted.created))
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<(), NotificationError> {
        let email = validate_email(email)?;

        let removed = self
            .store
            .delete_where(tables::SUBSCRIBERS, &Query::new().eq("email", email.as_str()))
            .await?;
        if removed == 0 {
            return Err(NotificationError::SubscriberNotFound(email));
        }

        info!("Unsubscribed {}", email);
        Ok(())
    }

    pub async fn list_emails(&self) -> Result<Vec<String>, NotificationError> {
        let subscribers: Vec<Subscriber> =
            decode_all(self.store.find(tables::SUBSCRIBERS, &Query::new()).await?)?;
        Ok(subscribers.into_iter().map(|s| s.email).collect())
    }
}
