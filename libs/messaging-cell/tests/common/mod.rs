#![allow(dead_code)]

use std::sync::Arc;

use messaging_cell::MessagingState;
use shared_config::AppConfig;
use shared_models::auth::{Actor, UserRole};
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::{AppState, ManualClock};
use staff_cell::{CreateStaffProfileRequest, StaffProfile, StaffProfileService};
use user_cell::{UpdateRoleRequest, UserService};

pub struct Fixture {
    pub state: MessagingState,
    pub clock: ManualClock,
    pub config: TestConfig,
    pub patient: Actor,
    pub other_patient: Actor,
    pub doctor: Actor,
    pub admin: Actor,
    pub doctor_profile: StaffProfile,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_app_config(|_| {}).await
    }

    pub async fn with_app_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let config = TestConfig::default();
        let mut app_config = config.to_app_config();
        adjust(&mut app_config);
        let clock = ManualClock::default();
        let app = AppState::in_memory(app_config, Arc::new(clock.clone()));
        let users = UserService::new(&app);

        let patient = users
            .ensure_user(&TestUser::patient("pat@example.com").to_user())
            .await
            .unwrap()
            .to_actor();
        let other_patient = users
            .ensure_user(&TestUser::patient("quinn@example.com").to_user())
            .await
            .unwrap()
            .to_actor();
        let admin = users
            .ensure_user(&TestUser::admin().to_user())
            .await
            .unwrap()
            .to_actor();

        let doctor_user = users
            .ensure_user(&TestUser::staff("doc@example.com").to_user())
            .await
            .unwrap();
        let doctor = users
            .set_role(doctor_user.id, UpdateRoleRequest { role: UserRole::Doctor, sub_role: None })
            .await
            .unwrap()
            .to_actor();

        let doctor_profile = StaffProfileService::new(&app)
            .create_profile(
                &doctor,
                CreateStaffProfileRequest {
                    specialization: Some("Cardiology".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        Self {
            state: MessagingState::new(app),
            clock,
            config,
            patient,
            other_patient,
            doctor,
            admin,
            doctor_profile,
        }
    }
}
