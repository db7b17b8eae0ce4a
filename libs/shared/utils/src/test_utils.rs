use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::clock::ManualClock;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub admin_emails: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            admin_emails: vec!["admin@hospital.test".to_string()],
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_jwt_secret: self.jwt_secret.clone(),
            admin_emails: self.admin_emails.clone(),
            ..AppConfig::default()
        }
    }

    /// In-memory application state driven by a manual clock.
    pub fn to_state(&self) -> (AppState, ManualClock) {
        let clock = ManualClock::default();
        let state = AppState::in_memory(self.to_app_config(), Arc::new(clock.clone()));
        (state, clock)
    }
}

pub struct TestUser {
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl TestUser {
    pub fn new(email: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            external_id: format!("idp|{}", Uuid::new_v4()),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "Pat", "Ient")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "Sam", "Staff")
    }

    /// Uses the first configured admin email so the user is promoted on sync.
    pub fn admin() -> Self {
        Self::new("admin@hospital.test", "Ada", "Admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.external_id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: Some(json!({
                "first_name": self.first_name,
                "last_name": self.last_name,
            })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.external_id,
            "email": user.email,
            "role": "authenticated",
            "user_metadata": {
                "first_name": user.first_name,
                "last_name": user.last_name,
            },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("HS256 signing with an HMAC secret")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
