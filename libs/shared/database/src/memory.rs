use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::query::Query;
use crate::store::{ensure_id, DocumentStore, Inserted, StoreError};

/// Process-local store. Documents keep insertion order per table; the single
/// write lock makes `insert_if_absent` a true check-and-insert.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table_len(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(match tables.get(table) {
            Some(rows) => query.apply(rows.iter()),
            None => Vec::new(),
        })
    }

    async fn insert(&self, table: &str, mut document: Value) -> Result<Value, StoreError> {
        let id = ensure_id(&mut document)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|row| row.get("id").and_then(|v| v.as_str()) == Some(id.as_str())) {
            return Err(StoreError::Rejected {
                status: 409,
                message: format!("duplicate id {} in {}", id, table),
            });
        }
        rows.push(document.clone());

        debug!("Inserted document {} into {}", id, table);
        Ok(document)
    }

    async fn insert_if_absent(
        &self,
        table: &str,
        key_field: &str,
        mut document: Value,
    ) -> Result<Inserted, StoreError> {
        let key = document
            .get(key_field)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| StoreError::InvalidDocument(format!("missing unique key {}", key_field)))?;
        ensure_id(&mut document)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(existing) = rows.iter().find(|row| row.get(key_field) == Some(&key)) {
            return Ok(Inserted {
                document: existing.clone(),
                created: false,
            });
        }

        rows.push(document.clone());
        debug!("Inserted unique document into {} on {}", table, key_field);

        Ok(Inserted {
            document,
            created: true,
        })
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(StoreError::InvalidDocument("patch must be a JSON object".to_string())),
        };

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(None);
        };

        let Some(row) = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(|v| v.as_str()) == Some(id))
        else {
            return Ok(None);
        };

        if let Some(object) = row.as_object_mut() {
            for (key, value) in patch {
                if key != "id" {
                    object.insert(key, value);
                }
            }
        }

        Ok(Some(row.clone()))
    }

    async fn delete_where(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !query.matches(row));
        let removed = before - rows.len();

        debug!("Deleted {} documents from {}", removed, table);
        Ok(removed)
    }

    async fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).count())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_ids_and_get_resolves_them() {
        let store = MemoryStore::new();
        let doc = store.insert("rooms", json!({"type": "direct"})).await.unwrap();
        let id = doc["id"].as_str().unwrap().to_string();

        let fetched = store.get("rooms", &id).await.unwrap().unwrap();
        assert_eq!(fetched["type"], "direct");
        assert!(store.get("rooms", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_insert_returns_existing_document() {
        let store = MemoryStore::new();
        let first = store
            .insert_if_absent("rooms", "roomKey", json!({"roomKey": "a:b:direct"}))
            .await
            .unwrap();
        let second = store
            .insert_if_absent("rooms", "roomKey", json!({"roomKey": "a:b:direct"}))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.document["id"], second.document["id"]);
        assert_eq!(store.table_len("rooms").await, 1);
    }

    #[tokio::test]
    async fn concurrent_conditional_inserts_create_one_document() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_if_absent("rooms", "roomKey", json!({"roomKey": "x:y:support"}))
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.table_len("rooms").await, 1);
    }

    #[tokio::test]
    async fn update_merges_fields_and_delete_counts_matches() {
        let store = MemoryStore::new();
        let doc = store
            .insert("messages", json!({"roomId": "r", "content": "hi"}))
            .await
            .unwrap();
        let id = doc["id"].as_str().unwrap();

        let updated = store
            .update("messages", id, json!({"content": "hello", "editedAt": 5}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["content"], "hello");
        assert_eq!(updated["roomId"], "r");

        store.insert("messages", json!({"roomId": "r"})).await.unwrap();
        store.insert("messages", json!({"roomId": "s"})).await.unwrap();
        let removed = store
            .delete_where("messages", &Query::new().eq("roomId", "r"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count("messages", &Query::new()).await.unwrap(), 1);
    }
}
