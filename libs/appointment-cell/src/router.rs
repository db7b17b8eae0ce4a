use axum::{
    routing::{get, patch, post},
    Router,
};

use shared_utils::AppState;
use user_cell::authenticated;

use crate::handlers;

pub fn appointment_routes(state: AppState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::request_appointment).get(handlers::list_my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::transition_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment));

    authenticated(protected_routes, &state).with_state(state)
}
