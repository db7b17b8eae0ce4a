use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use notification_cell::{notification_routes, LogNotifier, NotificationState};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn admin_publishes_and_public_lists_content() {
    let config = TestConfig::default();
    let (app, _clock) = config.to_state();
    let state = NotificationState::with_notifier(app, Arc::new(LogNotifier));
    let admin_token = JwtTestUtils::create_test_token(&TestUser::admin(), &config.jwt_secret, None);
    let patient_token =
        JwtTestUtils::create_test_token(&TestUser::patient("p@example.com"), &config.jwt_secret, None);

    let denied = notification_routes(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/articles/publish",
            Some(&patient_token),
            json!({"title": "Hydration", "body": "Drink water"}),
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let published = notification_routes(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/articles/publish",
            Some(&admin_token),
            json!({"title": "Hydration", "body": "Drink water"}),
        ))
        .await
        .unwrap();
    assert_eq!(published.status(), StatusCode::CREATED);

    let listed = notification_routes(state.clone())
        .oneshot(Request::builder().uri("/articles").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let body = body_json(listed).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Hydration");

    let unknown = notification_routes(state)
        .oneshot(Request::builder().uri("/recipes").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscribe_is_public_and_idempotent() {
    let (app, _clock) = TestConfig::default().to_state();
    let state = NotificationState::with_notifier(app, Arc::new(LogNotifier));

    let first = notification_routes(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/subscribers",
            None,
            json!({"email": "news@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let again = notification_routes(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/subscribers",
            None,
            json!({"email": "news@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);

    let removed = notification_routes(state)
        .oneshot(json_request(
            Method::POST,
            "/subscribers/unsubscribe",
            None,
            json!({"email": "news@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
}
