use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{UpdateProfileRequest, UpdateRoleRequest, UserListQuery, UserProfile};
use crate::services::UserService;

#[axum::debug_handler]
pub async fn get_me(Extension(profile): Extension<UserProfile>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = UserService::new(&state)
        .update_profile(actor.user_id, request)
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user = UserService::new(&state).get_user(user_id).await?;

    Ok(Json(json!(user.snapshot())))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    actor.require(Capability::ManageUsers)?;

    let users = UserService::new(&state).list_users(query).await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require(Capability::ManageUsers)?;

    let user = UserService::new(&state).set_role(user_id, request).await?;

    Ok(Json(json!(user)))
}
