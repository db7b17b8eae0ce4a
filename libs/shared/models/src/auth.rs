use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PermissionDenied, ValidationFailure};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Identity as asserted by the identity provider's token. Not a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn first_name(&self) -> Option<String> {
        self.metadata_str("first_name")
    }

    pub fn last_name(&self) -> Option<String> {
        self.metadata_str("last_name")
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.metadata_str("avatar_url")
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Patient,
    Doctor,
    Nurse,
    Staff,
    Admin,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Doctor | UserRole::Nurse | UserRole::Staff)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Nurse => write!(f, "nurse"),
            UserRole::Staff => write!(f, "staff"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ValidationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "nurse" => Ok(UserRole::Nurse),
            "staff" => Ok(UserRole::Staff),
            "admin" => Ok(UserRole::Admin),
            other => Err(ValidationFailure(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SendMessages,
    RequestAppointments,
    ManageOwnStaffProfile,
    ManageAvailability,
    ManageAppointments,
    ViewAllAppointments,
    VerifyStaff,
    SendOnBehalf,
    PublishContent,
    ManageUsers,
    RunMaintenance,
}

/// Permission set derived from a role once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn for_role(role: UserRole) -> Self {
        use Capability::*;

        let granted: &[Capability] = match role {
            UserRole::Patient => &[SendMessages, RequestAppointments],
            UserRole::Doctor | UserRole::Nurse | UserRole::Staff => &[
                SendMessages,
                ManageOwnStaffProfile,
                ManageAvailability,
                ManageAppointments,
            ],
            UserRole::Admin => &[
                SendMessages,
                RequestAppointments,
                ManageAppointments,
                ViewAllAppointments,
                VerifyStaff,
                SendOnBehalf,
                PublishContent,
                ManageUsers,
                RunMaintenance,
            ],
        };

        Self(granted.iter().copied().collect())
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), PermissionDenied> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(PermissionDenied(format!(
                "Missing capability: {}",
                serde_json::to_value(capability)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default()
            )))
        }
    }
}

/// The authenticated caller, resolved to a stored user and its capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub external_id: String,
    pub email: String,
    pub role: UserRole,
    pub capabilities: Capabilities,
}

impl Actor {
    pub fn new(user_id: Uuid, external_id: String, email: String, role: UserRole) -> Self {
        Self {
            user_id,
            external_id,
            email,
            role,
            capabilities: Capabilities::for_role(role),
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), PermissionDenied> {
        self.capabilities.require(capability)
    }
}
