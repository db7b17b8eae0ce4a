use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};
use shared_models::error::AppError;

use crate::models::{ContentKind, ContentListQuery, PublishContentRequest, SubscribeRequest};
use crate::services::{ContentPoller, ContentService, SubscriberService};
use crate::state::NotificationState;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_content(
    State(state): State<NotificationState>,
    Path(kind): Path<String>,
    Query(query): Query<ContentListQuery>,
) -> Result<Json<Value>, AppError> {
    let kind: ContentKind = kind.parse()?;
    let items = ContentService::new(&state.app).list(kind, query.limit).await?;

    Ok(Json(json!({
        "kind": kind,
        "items": items,
        "total": items.len()
    })))
}

#[axum::debug_handler]
pub async fn get_content(
    State(state): State<NotificationState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let kind: ContentKind = kind.parse()?;
    let item = ContentService::new(&state.app).get(kind, id).await?;

    Ok(Json(json!(item)))
}

#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<NotificationState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (subscriber, created) = SubscriberService::new(&state.app)
        .subscribe(&request.email)
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!(subscriber))))
}

#[axum::debug_handler]
pub async fn unsubscribe(
    State(state): State<NotificationState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<StatusCode, AppError> {
    SubscriberService::new(&state.app)
        .unsubscribe(&request.email)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn publish_content(
    State(state): State<NotificationState>,
    Extension(actor): Extension<Actor>,
    Path(kind): Path<String>,
    Json(request): Json<PublishContentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let kind: ContentKind = kind.parse()?;
    let item = ContentService::new(&state.app)
        .publish(&actor, kind, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(item))))
}

#[axum::debug_handler]
pub async fn trigger_poll(
    State(state): State<NotificationState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    actor.require(Capability::RunMaintenance)?;

    let report = ContentPoller::new(&state).poll_once().await?;

    Ok(Json(json!(report)))
}
