use axum::{
    routing::{get, patch},
    Router,
};

use shared_utils::AppState;

use crate::handlers;
use crate::middleware::authenticated;

pub fn user_routes(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_users))
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        .route("/{user_id}", get(handlers::get_user))
        .route("/{user_id}/role", patch(handlers::update_user_role));

    authenticated(protected_routes, &state).with_state(state)
}
