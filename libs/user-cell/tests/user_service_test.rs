use assert_matches::assert_matches;
use uuid::Uuid;

use shared_models::auth::UserRole;
use shared_utils::test_utils::{TestConfig, TestUser};
use user_cell::{UpdateProfileRequest, UpdateRoleRequest, UserError, UserListQuery, UserService};

#[tokio::test]
async fn first_contact_creates_patient_once() {
    let (state, _clock) = TestConfig::default().to_state();
    let service = UserService::new(&state);
    let identity = TestUser::patient("Ana@Example.com").to_user();

    let first = service.ensure_user(&identity).await.unwrap();
    let second = service.ensure_user(&identity).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.role, UserRole::Patient);
    assert_eq!(first.email, "ana@example.com");
    assert_eq!(first.first_name.as_deref(), Some("Pat"));
}

#[tokio::test]
async fn configured_admin_emails_are_promoted() {
    let (state, _clock) = TestConfig::default().to_state();
    let admin = UserService::new(&state)
        .ensure_user(&TestUser::admin().to_user())
        .await
        .unwrap();

    assert_eq!(admin.role, UserRole::Admin);
}

#[tokio::test]
async fn profile_updates_validate_avatar_url() {
    let (state, _clock) = TestConfig::default().to_state();
    let service = UserService::new(&state);
    let user = service
        .ensure_user(&TestUser::patient("p@example.com").to_user())
        .await
        .unwrap();

    let rejected = service
        .update_profile(
            user.id,
            UpdateProfileRequest {
                avatar_url: Some("javascript:alert(1)".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(rejected, Err(UserError::Validation(_)));

    let updated = service
        .update_profile(
            user.id,
            UpdateProfileRequest {
                first_name: Some("  Maria ".to_string()),
                avatar_url: Some("https://files.example.com/avatars/1.png".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.first_name.as_deref(), Some("Maria"));
    assert_eq!(updated.avatar_url.as_deref(), Some("https://files.example.com/avatars/1.png"));
    assert!(updated.updated_at.is_some());
}

#[tokio::test]
async fn role_changes_are_visible_in_filtered_listing() {
    let (state, _clock) = TestConfig::default().to_state();
    let service = UserService::new(&state);
    let user = service
        .ensure_user(&TestUser::staff("doc@example.com").to_user())
        .await
        .unwrap();
    service
        .ensure_user(&TestUser::patient("p@example.com").to_user())
        .await
        .unwrap();

    service
        .set_role(
            user.id,
            UpdateRoleRequest {
                role: UserRole::Doctor,
                sub_role: Some("cardiology".to_string()),
            },
        )
        .await
        .unwrap();

    let doctors = service
        .list_users(UserListQuery {
            role: Some(UserRole::Doctor),
            limit: None,
        })
        .await
        .unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].sub_role.as_deref(), Some("cardiology"));
}

#[tokio::test]
async fn unknown_users_are_not_found() {
    let (state, _clock) = TestConfig::default().to_state();
    let result = UserService::new(&state).get_user(Uuid::new_v4()).await;

    assert_matches!(result, Err(UserError::NotFound(_)));
}
