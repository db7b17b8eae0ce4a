use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{tables, StoreError};
use shared_models::error::{AppError, PermissionDenied, ValidationFailure};

// ==============================================================================
// CONTENT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Announcement,
    Article,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::Announcement, ContentKind::Article];

    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Announcement => tables::ANNOUNCEMENTS,
            ContentKind::Article => tables::ARTICLES,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Accepts the table name or the singular kind, so `/content/articles` and
/// `/content/article` both resolve.
impl FromStr for ContentKind {
    type Err = ValidationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "announcement" | "announcements" => Ok(ContentKind::Announcement),
            "article" | "articles" => Ok(ContentKind::Article),
            other => Err(ValidationFailure(format!("Unknown content kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishContentRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentListQuery {
    pub limit: Option<usize>,
}

/// What a notifier receives for each newly published item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNotice {
    pub kind: ContentKind,
    pub item: ContentItem,
}

// ==============================================================================
// SUBSCRIBERS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

// ==============================================================================
// POLLING
// ==============================================================================

/// Last-seen item count per content table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCursor {
    pub id: Uuid,
    pub table: String,
    pub last_seen_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindReport {
    pub kind: ContentKind,
    pub previous_count: Option<usize>,
    pub current_count: usize,
    pub notified: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollReport {
    pub kinds: Vec<KindReport>,
    pub recipients: usize,
}

impl PollReport {
    pub fn notified(&self) -> usize {
        self.kinds.iter().map(|kind| kind.notified).sum()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Content {0} not found")]
    ContentNotFound(Uuid),

    #[error("Subscriber {0} not found")]
    SubscriberNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Permission(#[from] PermissionDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::ContentNotFound(_) | NotificationError::SubscriberNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            NotificationError::Validation(failure) => failure.into(),
            NotificationError::Permission(denied) => denied.into(),
            NotificationError::Store(store) => store.into(),
        }
    }
}
