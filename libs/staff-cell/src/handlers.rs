use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    AvailabilityStatusRequest, CreateAvailabilityRequest, CreateStaffProfileRequest, RatingRequest,
    StaffSearchFilters, UpdateAvailabilityRequest, UpdateStaffProfileRequest, VerifyStaffRequest,
};
use crate::services::{AvailabilityService, StaffProfileService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_staff(
    State(state): State<AppState>,
    Query(filters): Query<StaffSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let profiles = StaffProfileService::new(&state).search(filters).await?;

    Ok(Json(json!({
        "profiles": profiles,
        "total": profiles.len()
    })))
}

#[axum::debug_handler]
pub async fn get_staff_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state).get_profile(profile_id).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn get_staff_profile_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state)
        .get_profile_for_user(user_id)
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn list_staff_availability(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = AvailabilityService::new(&state).list_for_staff(user_id).await?;

    Ok(Json(json!({
        "staffUserId": user_id,
        "slots": slots
    })))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_staff_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateStaffProfileRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let profile = StaffProfileService::new(&state)
        .create_profile(&actor, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(profile))))
}

#[axum::debug_handler]
pub async fn update_own_staff_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateStaffProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state)
        .update_own_profile(&actor, request)
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn verify_staff_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<VerifyStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state)
        .set_verified(&actor, profile_id, request.is_verified)
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn set_staff_availability_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<AvailabilityStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state)
        .set_available(&actor, profile_id, request.is_available)
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn rate_staff(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffProfileService::new(&state)
        .add_rating(&actor, profile_id, request.rating)
        .await?;

    Ok(Json(json!({
        "rating": profile.rating,
        "ratingCount": profile.rating_count
    })))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let slot = AvailabilityService::new(&state).add_slot(&actor, request).await?;

    Ok((StatusCode::CREATED, Json(json!(slot))))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = AvailabilityService::new(&state)
        .update_slot(&actor, slot_id, request)
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    AvailabilityService::new(&state).delete_slot(&actor, slot_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
