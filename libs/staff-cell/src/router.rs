use axum::{
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::AppState;
use user_cell::authenticated;

use crate::handlers;

pub fn staff_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/search", get(handlers::search_staff))
        .route("/{profile_id}", get(handlers::get_staff_profile))
        .route("/users/{user_id}", get(handlers::get_staff_profile_for_user))
        .route("/users/{user_id}/availability", get(handlers::list_staff_availability));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_staff_profile))
        .route("/me", put(handlers::update_own_staff_profile))
        .route("/{profile_id}/verify", patch(handlers::verify_staff_profile))
        .route("/{profile_id}/availability-status", patch(handlers::set_staff_availability_status))
        .route("/{profile_id}/ratings", post(handlers::rate_staff))
        .route("/availability", post(handlers::create_availability))
        .route(
            "/availability/{slot_id}",
            put(handlers::update_availability).delete(handlers::delete_availability),
        );

    Router::new()
        .merge(public_routes)
        .merge(authenticated(protected_routes, &state))
        .with_state(state)
}
