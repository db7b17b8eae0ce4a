use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::auth::UserRole;
use shared_models::error::{AppError, PermissionDenied, ValidationFailure};

/// Professional profile of a doctor, nurse or other staff member. At most
/// one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_family: UserRole,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_available: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffProfileRequest {
    /// Defaults to the caller's own role.
    pub role_family: Option<UserRole>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaffProfileRequest {
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub qualifications: Option<Vec<String>>,
    pub experience_years: Option<u32>,
    pub languages: Option<Vec<String>>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSearchFilters {
    pub role_family: Option<UserRole>,
    /// Case-insensitive substring match.
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub verified_only: Option<bool>,
    pub available_only: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStaffRequest {
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityStatusRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
}

/// A bookable window for a staff member: weekly on `day_of_week`
/// (0 = Sunday) or once on `date`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTime {
    pub id: Uuid,
    pub staff_user_id: Uuid,
    pub day_of_week: Option<u8>,
    pub date: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub is_recurring: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAvailabilityRequest {
    pub day_of_week: Option<u8>,
    pub date: Option<String>,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Error, Debug)]
pub enum StaffError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Permission(#[from] PermissionDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StaffError> for AppError {
    fn from(err: StaffError) -> Self {
        match err {
            StaffError::NotFound(msg) => AppError::NotFound(msg),
            StaffError::Conflict(msg) => AppError::Conflict(msg),
            StaffError::Validation(failure) => failure.into(),
            StaffError::Permission(denied) => denied.into(),
            StaffError::Store(store) => store.into(),
        }
    }
}
