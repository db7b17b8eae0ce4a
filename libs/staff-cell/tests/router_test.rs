use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use shared_models::auth::UserRole;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use staff_cell::staff_routes;
use user_cell::{UpdateRoleRequest, UserService};

fn json_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn staff_member_creates_profile_and_public_lookup_finds_it() {
    let config = TestConfig::default();
    let (state, _clock) = config.to_state();
    let doctor = TestUser::staff("doc@example.com");

    let user = UserService::new(&state)
        .ensure_user(&doctor.to_user())
        .await
        .unwrap();
    UserService::new(&state)
        .set_role(user.id, UpdateRoleRequest { role: UserRole::Doctor, sub_role: None })
        .await
        .unwrap();

    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let created = staff_routes(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/",
            &token,
            json!({"specialization": "Dermatology"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = staff_routes(state.clone())
        .oneshot(json_request(Method::POST, "/", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let lookup = staff_routes(state)
        .oneshot(
            Request::builder()
                .uri(format!("/users/{}", user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(lookup.status(), StatusCode::OK);

    let bytes = to_bytes(lookup.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["specialization"], "Dermatology");
    assert_eq!(body["roleFamily"], "doctor");
}

#[tokio::test]
async fn malformed_slot_times_are_bad_requests() {
    let config = TestConfig::default();
    let (state, _clock) = config.to_state();
    let nurse = TestUser::staff("nurse@example.com");

    let user = UserService::new(&state)
        .ensure_user(&nurse.to_user())
        .await
        .unwrap();
    UserService::new(&state)
        .set_role(user.id, UpdateRoleRequest { role: UserRole::Nurse, sub_role: None })
        .await
        .unwrap();

    let token = JwtTestUtils::create_test_token(&nurse, &config.jwt_secret, None);
    let response = staff_routes(state)
        .oneshot(json_request(
            Method::POST,
            "/availability",
            &token,
            json!({"dayOfWeek": 3, "startTime": "9am", "endTime": "17:00"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
