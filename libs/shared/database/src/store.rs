use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use shared_models::error::AppError;

use crate::query::Query;

pub mod tables {
    pub const USERS: &str = "users";
    pub const STAFF_PROFILES: &str = "staff_profiles";
    pub const AVAILABLE_TIMES: &str = "available_times";
    pub const APPOINTMENTS: &str = "appointments";
    pub const ROOMS: &str = "rooms";
    pub const MESSAGES: &str = "messages";
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const ARTICLES: &str = "articles";
    pub const SUBSCRIBERS: &str = "subscribers";
    pub const NOTIFICATION_CURSORS: &str = "notification_cursors";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Request(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result of a conditional insert keyed on a unique field.
#[derive(Debug, Clone)]
pub struct Inserted {
    pub document: Value,
    pub created: bool,
}

/// Table-oriented document store. Every write touches a single document and
/// is atomic on its own; there are no multi-document transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, table: &str, query: &Query) -> Result<Option<Value>, StoreError> {
        let limited = query.clone().limit(1);
        Ok(self.find(table, &limited).await?.into_iter().next())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.find_one(table, &Query::new().eq("id", id)).await
    }

    /// Inserts a document, assigning an `id` when it has none.
    async fn insert(&self, table: &str, document: Value) -> Result<Value, StoreError>;

    /// Inserts unless a document with the same `key_field` value exists, in
    /// which case the existing document is returned. Atomic per call.
    async fn insert_if_absent(
        &self,
        table: &str,
        key_field: &str,
        document: Value,
    ) -> Result<Inserted, StoreError>;

    /// Shallow-merges `patch` into the document with the given id.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError>;

    async fn delete_where(&self, table: &str, query: &Query) -> Result<usize, StoreError>;

    async fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError>;
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(value)?)
}

pub fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>, StoreError> {
    values.into_iter().map(decode).collect()
}

pub(crate) fn ensure_id(document: &mut Value) -> Result<String, StoreError> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("document must be a JSON object".to_string()))?;

    match object.get("id").and_then(|id| id.as_str()) {
        Some(id) => Ok(id.to_string()),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            object.insert("id".to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}
