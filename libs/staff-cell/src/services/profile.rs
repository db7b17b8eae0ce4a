use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, DocumentStore, Query, SortOrder, StoreError};
use shared_models::auth::{Actor, Capability};
use shared_models::error::{PermissionDenied, ValidationFailure};
use shared_utils::validation::non_empty_trimmed;
use shared_utils::{AppState, Clock};

use crate::models::{
    CreateStaffProfileRequest, StaffError, StaffProfile, StaffSearchFilters,
    UpdateStaffProfileRequest,
};

const DEFAULT_SEARCH_LIMIT: usize = 50;

pub struct StaffProfileService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl StaffProfileService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Creates the caller's profile. A second create for the same user is a
    /// conflict, decided atomically by the store.
    pub async fn create_profile(
        &self,
        actor: &Actor,
        request: CreateStaffProfileRequest,
    ) -> Result<StaffProfile, StaffError> {
        debug!("Creating staff profile for user {}", actor.user_id);
        actor.require(Capability::ManageOwnStaffProfile)?;

        let role_family = request.role_family.unwrap_or(actor.role);
        if !role_family.is_staff() {
            return Err(ValidationFailure(format!("{} is not a staff role family", role_family)).into());
        }
        if let Some(fee) = request.consultation_fee {
            validate_fee(fee)?;
        }

        let profile = StaffProfile {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            role_family,
            license_number: optional_text("licenseNumber", request.license_number)?,
            specialization: optional_text("specialization", request.specialization)?,
            department: optional_text("department", request.department)?,
            qualifications: clean_list(request.qualifications),
            experience_years: request.experience_years,
            languages: clean_list(request.languages),
            bio: request.bio.map(|bio| bio.trim().to_string()).filter(|bio| !bio.is_empty()),
            consultation_fee: request.consultation_fee,
            rating: 0.0,
            rating_count: 0,
            is_verified: false,
            is_available: true,
            created_at: self.clock.now(),
            updated_at: None,
        };

        let inserted = self
            .store
            .insert_if_absent(
                tables::STAFF_PROFILES,
                "userId",
                serde_json::to_value(&profile).map_err(StoreError::from)?,
            )
            .await?;

        if !inserted.created {
            warn!("User {} already has a staff profile", actor.user_id);
            return Err(StaffError::Conflict(format!(
                "User {} already has a staff profile",
                actor.user_id
            )));
        }

        let profile: StaffProfile = decode(inserted.document)?;
        info!("Staff profile {} created for user {}", profile.id, profile.user_id);
        Ok(profile)
    }

    pub async fn find_by_id(&self, profile_id: Uuid) -> Result<Option<StaffProfile>, StoreError> {
        self.store
            .get(tables::STAFF_PROFILES, &profile_id.to_string())
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<StaffProfile>, StoreError> {
        self.store
            .find_one(tables::STAFF_PROFILES, &Query::new().eq("userId", user_id.to_string()))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn get_profile(&self, profile_id: Uuid) -> Result<StaffProfile, StaffError> {
        debug!("Fetching staff profile {}", profile_id);
        self.find_by_id(profile_id)
            .await?
            .ok_or_else(|| StaffError::NotFound(format!("Staff profile {} not found", profile_id)))
    }

    pub async fn get_profile_for_user(&self, user_id: Uuid) -> Result<StaffProfile, StaffError> {
        debug!("Fetching staff profile of user {}", user_id);
        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| StaffError::NotFound(format!("User {} has no staff profile", user_id)))
    }

    pub async fn update_own_profile(
        &self,
        actor: &Actor,
        request: UpdateStaffProfileRequest,
    ) -> Result<StaffProfile, StaffError> {
        debug!("Updating staff profile of user {}", actor.user_id);
        actor.require(Capability::ManageOwnStaffProfile)?;
        let profile = self.get_profile_for_user(actor.user_id).await?;

        let mut patch = Map::new();
        if let Some(license) = request.license_number {
            patch.insert("licenseNumber".to_string(), json!(non_empty_trimmed("licenseNumber", &license)?));
        }
        if let Some(specialization) = request.specialization {
            patch.insert(
                "specialization".to_string(),
                json!(non_empty_trimmed("specialization", &specialization)?),
            );
        }
        if let Some(department) = request.department {
            patch.insert("department".to_string(), json!(non_empty_trimmed("department", &department)?));
        }
        if let Some(qualifications) = request.qualifications {
            patch.insert("qualifications".to_string(), json!(clean_list(qualifications)));
        }
        if let Some(years) = request.experience_years {
            patch.insert("experienceYears".to_string(), json!(years));
        }
        if let Some(languages) = request.languages {
            patch.insert("languages".to_string(), json!(clean_list(languages)));
        }
        if let Some(bio) = request.bio {
            let bio = bio.trim();
            patch.insert(
                "bio".to_string(),
                if bio.is_empty() { Value::Null } else { json!(bio) },
            );
        }
        if let Some(fee) = request.consultation_fee {
            validate_fee(fee)?;
            patch.insert("consultationFee".to_string(), json!(fee));
        }

        self.apply_patch(profile.id, patch).await
    }

    /// Lists profiles, best rated first.
    pub async fn search(&self, filters: StaffSearchFilters) -> Result<Vec<StaffProfile>, StaffError> {
        debug!("Searching staff profiles with filters: {:?}", filters);

        let mut query = Query::new().order_by("rating", SortOrder::Desc);
        if let Some(role_family) = filters.role_family {
            query = query.eq("roleFamily", role_family.to_string());
        }
        if filters.verified_only.unwrap_or(false) {
            query = query.eq("isVerified", true);
        }
        if filters.available_only.unwrap_or(false) {
            query = query.eq("isAvailable", true);
        }

        let profiles: Vec<StaffProfile> =
            decode_all(self.store.find(tables::STAFF_PROFILES, &query).await?)?;

        let specialization = filters.specialization.map(|s| s.trim().to_lowercase());
        let department = filters.department.map(|d| d.trim().to_lowercase());

        Ok(profiles
            .into_iter()
            .filter(|profile| matches_text(&profile.specialization, specialization.as_deref()))
            .filter(|profile| matches_text(&profile.department, department.as_deref()))
            .take(filters.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .collect())
    }

    pub async fn set_verified(
        &self,
        actor: &Actor,
        profile_id: Uuid,
        is_verified: bool,
    ) -> Result<StaffProfile, StaffError> {
        actor.require(Capability::VerifyStaff)?;
        self.get_profile(profile_id).await?;

        let mut patch = Map::new();
        patch.insert("isVerified".to_string(), json!(is_verified));
        let profile = self.apply_patch(profile_id, patch).await?;

        info!("Staff profile {} verification set to {} by {}", profile_id, is_verified, actor.user_id);
        Ok(profile)
    }

    /// Owner or admin may toggle whether the profile accepts bookings.
    pub async fn set_available(
        &self,
        actor: &Actor,
        profile_id: Uuid,
        is_available: bool,
    ) -> Result<StaffProfile, StaffError> {
        let profile = self.get_profile(profile_id).await?;
        if profile.user_id != actor.user_id && !actor.role.is_admin() {
            return Err(PermissionDenied("Only the owner can change availability".to_string()).into());
        }

        let mut patch = Map::new();
        patch.insert("isAvailable".to_string(), json!(is_available));
        let profile = self.apply_patch(profile_id, patch).await?;

        info!("Staff profile {} availability set to {}", profile_id, is_available);
        Ok(profile)
    }

    /// Folds a 1-5 rating into the running average.
    pub async fn add_rating(
        &self,
        actor: &Actor,
        profile_id: Uuid,
        rating: u8,
    ) -> Result<StaffProfile, StaffError> {
        if !(1..=5).contains(&rating) {
            return Err(ValidationFailure("rating must be between 1 and 5".to_string()).into());
        }

        let profile = self.get_profile(profile_id).await?;
        if profile.user_id == actor.user_id {
            return Err(PermissionDenied("Staff cannot rate their own profile".to_string()).into());
        }

        let count = profile.rating_count + 1;
        let average = (profile.rating * f64::from(profile.rating_count) + f64::from(rating)) / f64::from(count);

        let mut patch = Map::new();
        patch.insert("rating".to_string(), json!(average));
        patch.insert("ratingCount".to_string(), json!(count));
        self.apply_patch(profile_id, patch).await
    }

    async fn apply_patch(
        &self,
        profile_id: Uuid,
        mut patch: Map<String, Value>,
    ) -> Result<StaffProfile, StaffError> {
        patch.insert("updatedAt".to_string(), json!(self.clock.now().timestamp_millis()));

        let updated = self
            .store
            .update(tables::STAFF_PROFILES, &profile_id.to_string(), Value::Object(patch))
            .await?
            .ok_or_else(|| StaffError::NotFound(format!("Staff profile {} not found", profile_id)))?;

        Ok(decode(updated)?)
    }
}

fn optional_text(field: &str, value: Option<String>) -> Result<Option<String>, ValidationFailure> {
    value.map(|v| non_empty_trimmed(field, &v)).transpose()
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn validate_fee(fee: f64) -> Result<(), ValidationFailure> {
    if fee.is_finite() && fee >= 0.0 {
        Ok(())
    } else {
        Err(ValidationFailure("consultationFee must be a non-negative amount".to_string()))
    }
}

fn matches_text(value: &Option<String>, needle: Option<&str>) -> bool {
    match needle {
        None | Some("") => true,
        Some(needle) => value
            .as_deref()
            .map(|v| v.to_lowercase().contains(needle))
            .unwrap_or(false),
    }
}
