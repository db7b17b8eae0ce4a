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

use crate::models::{AppointmentListQuery, CreateAppointmentRequest, RescheduleRequest, TransitionRequest};
use crate::services::{AppointmentBookingService, AppointmentLifecycleService};

#[axum::debug_handler]
pub async fn request_appointment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .request_appointment(&actor, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .list_for_actor(&actor, query)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .get_appointment(&actor, appointment_id)
        .await?;
    let next_statuses = AppointmentLifecycleService::new().get_valid_transitions(appointment.status);

    Ok(Json(json!({
        "appointment": appointment,
        "nextStatuses": next_statuses
    })))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .transition(&actor, appointment_id, request)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .reschedule(&actor, appointment_id, request)
        .await?;

    Ok(Json(json!(appointment)))
}
