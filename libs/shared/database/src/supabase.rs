use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::query::Query;
use crate::store::{ensure_id, DocumentStore, Inserted, StoreError};

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let token = auth_token.unwrap_or(&self.service_key);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Array(Vec::new()))?);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(raw)
        .map_err(|e| StoreError::Request(format!("invalid header value: {}", e)))
}

fn prefer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static(value));
    headers
}

fn table_path(table: &str, query_string: &str) -> String {
    if query_string.is_empty() {
        format!("/rest/v1/{}", table)
    } else {
        format!("/rest/v1/{}?{}", table, query_string)
    }
}

/// `DocumentStore` over Supabase PostgREST, authenticated with the service key.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let path = table_path(table, &query.to_postgrest());
        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn insert(&self, table: &str, mut document: Value) -> Result<Value, StoreError> {
        ensure_id(&mut document)?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &table_path(table, ""),
                None,
                Some(document),
                Some(prefer("return=representation")),
            )
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidDocument(format!("insert into {} returned nothing", table)))
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

        let path = table_path(table, &format!("on_conflict={}", key_field));
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                None,
                Some(document),
                Some(prefer("resolution=ignore-duplicates,return=representation")),
            )
            .await?;

        if let Some(created) = result.into_iter().next() {
            return Ok(Inserted {
                document: created,
                created: true,
            });
        }

        let existing = self
            .find_one(table, &Query::new().eq(key_field, key))
            .await?
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!("conflict on {} but no row found", key_field))
            })?;

        Ok(Inserted {
            document: existing,
            created: false,
        })
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError> {
        let path = table_path(table, &Query::new().eq("id", id).to_postgrest_filters());
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(patch),
                Some(prefer("return=representation")),
            )
            .await?;

        Ok(result.into_iter().next())
    }

    async fn delete_where(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let path = table_path(table, &query.to_postgrest_filters());
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                None,
                Some(prefer("return=representation")),
            )
            .await?;

        Ok(result.len())
    }

    async fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let filters = query.to_postgrest_filters();
        let query_string = if filters.is_empty() {
            "select=id".to_string()
        } else {
            format!("select=id&{}", filters)
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &table_path(table, &query_string), None, None)
            .await?;

        Ok(result.len())
    }
}
