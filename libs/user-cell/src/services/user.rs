use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{decode, decode_all, tables, DocumentStore, Query, SortOrder, StoreError};
use shared_models::auth::{User, UserRole};
use shared_models::error::ValidationFailure;
use shared_utils::validation::{non_empty_trimmed, validate_email, validate_url};
use shared_utils::{AppState, Clock};

use crate::models::{UpdateProfileRequest, UpdateRoleRequest, UserError, UserListQuery, UserProfile, UserSnapshot};

const DEFAULT_LIST_LIMIT: usize = 100;

pub struct UserService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: Arc<AppConfig>,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            config: state.config.clone(),
        }
    }

    /// Returns the stored user for an identity, creating it on first contact.
    pub async fn ensure_user(&self, identity: &User) -> Result<UserProfile, UserError> {
        if let Some(existing) = self.find_by_external_id(&identity.id).await? {
            return Ok(existing);
        }

        let email = identity
            .email
            .as_deref()
            .ok_or_else(|| ValidationFailure("Identity carries no email".to_string()))
            .and_then(validate_email)?;

        let role = if self.config.is_admin_email(&email) {
            UserRole::Admin
        } else {
            UserRole::Patient
        };

        let profile = UserProfile {
            id: Uuid::new_v4(),
            external_id: identity.id.clone(),
            email,
            first_name: identity.first_name(),
            last_name: identity.last_name(),
            avatar_url: identity.avatar_url(),
            role,
            sub_role: None,
            created_at: self.clock.now(),
            updated_at: None,
        };

        let inserted = self
            .store
            .insert_if_absent(tables::USERS, "externalId", serde_json::to_value(&profile).map_err(StoreError::from)?)
            .await?;

        let user: UserProfile = decode(inserted.document)?;
        if inserted.created {
            info!("Created user {} ({}) on first contact as {}", user.id, user.email, user.role);
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        self.store
            .get(tables::USERS, &user_id.to_string())
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.store
            .find_one(tables::USERS, &Query::new().eq("externalId", external_id))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserProfile, UserError> {
        debug!("Fetching user {}", user_id);
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| UserError::NotFound(user_id.to_string()))
    }

    /// Display snapshots for a set of users; unknown ids are skipped.
    pub async fn snapshots(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, UserSnapshot>, StoreError> {
        let mut snapshots = HashMap::new();
        for user_id in user_ids {
            if snapshots.contains_key(user_id) {
                continue;
            }
            if let Some(user) = self.find_by_id(*user_id).await? {
                snapshots.insert(*user_id, user.snapshot());
            }
        }
        Ok(snapshots)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, UserError> {
        debug!("Updating profile for user {}", user_id);

        let mut patch = Map::new();
        if let Some(first_name) = request.first_name {
            let first_name = non_empty_trimmed("firstName", &first_name)?;
            patch.insert("firstName".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            let last_name = non_empty_trimmed("lastName", &last_name)?;
            patch.insert("lastName".to_string(), json!(last_name));
        }
        if let Some(avatar_url) = request.avatar_url {
            let avatar_url = validate_url("avatarUrl", &avatar_url)?;
            patch.insert("avatarUrl".to_string(), json!(avatar_url));
        }
        if let Some(sub_role) = request.sub_role {
            let sub_role = sub_role.trim();
            patch.insert(
                "subRole".to_string(),
                if sub_role.is_empty() { Value::Null } else { json!(sub_role) },
            );
        }
        patch.insert("updatedAt".to_string(), json!(self.clock.now().timestamp_millis()));

        let updated = self
            .store
            .update(tables::USERS, &user_id.to_string(), Value::Object(patch))
            .await?
            .ok_or_else(|| UserError::NotFound(user_id.to_string()))?;

        Ok(decode(updated)?)
    }

    pub async fn set_role(&self, user_id: Uuid, request: UpdateRoleRequest) -> Result<UserProfile, UserError> {
        let patch = json!({
            "role": request.role,
            "subRole": request.sub_role.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            "updatedAt": self.clock.now().timestamp_millis(),
        });

        let updated = self
            .store
            .update(tables::USERS, &user_id.to_string(), patch)
            .await?
            .ok_or_else(|| UserError::NotFound(user_id.to_string()))?;

        let user: UserProfile = decode(updated)?;
        info!("User {} role set to {}", user.id, user.role);
        Ok(user)
    }

    pub async fn list_users(&self, query: UserListQuery) -> Result<Vec<UserProfile>, UserError> {
        let mut lookup = Query::new()
            .order_by("createdAt", SortOrder::Asc)
            .limit(query.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        if let Some(role) = query.role {
            lookup = lookup.eq("role", role.to_string());
        }

        let rows = self.store.find(tables::USERS, &lookup).await?;
        Ok(decode_all(rows)?)
    }
}
