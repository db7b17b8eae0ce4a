use axum::{
    routing::{get, post},
    Router,
};

use user_cell::authenticated;

use crate::handlers;
use crate::state::NotificationState;

pub fn notification_routes(state: NotificationState) -> Router {
    let public_routes = Router::new()
        .route("/subscribers", post(handlers::subscribe))
        .route("/subscribers/unsubscribe", post(handlers::unsubscribe))
        .route("/{kind}", get(handlers::list_content))
        .route("/{kind}/{id}", get(handlers::get_content));

    let protected_routes = Router::new()
        .route("/{kind}/publish", post(handlers::publish_content))
        .route("/notifications/poll", post(handlers::trigger_poll));

    Router::new()
        .merge(public_routes)
        .merge(authenticated(protected_routes, &state.app))
        .with_state(state)
}
