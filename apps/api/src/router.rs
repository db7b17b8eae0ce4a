use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::appointment_routes;
use messaging_cell::{messaging_routes, MessagingState};
use notification_cell::{notification_routes, NotificationState};
use shared_utils::AppState;
use staff_cell::staff_routes;
use user_cell::user_routes;

pub fn create_router(
    state: AppState,
    messaging: MessagingState,
    notifications: NotificationState,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Ward portal API is running!" }))
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok" })) }),
        )
        .nest("/users", user_routes(state.clone()))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
        .nest("/messaging", messaging_routes(messaging))
        .nest("/content", notification_routes(notifications))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use shared_utils::test_utils::TestConfig;
    use tower::ServiceExt;

    fn app() -> Router {
        let (state, _clock) = TestConfig::default().to_state();
        create_router(
            state.clone(),
            MessagingState::new(state.clone()),
            NotificationState::new(state),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cells_are_mounted_behind_auth() {
        for uri in ["/users/me", "/appointments", "/messaging/rooms"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let public = app()
            .oneshot(Request::builder().uri("/content/announcements").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(public.status(), StatusCode::OK);
    }
}
