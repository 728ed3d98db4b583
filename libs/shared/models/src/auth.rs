use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::meta::RecordMeta;

/// Closed role set. Unknown strings coming back from the persistence
/// boundary fail deserialization instead of leaking through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Specialist,
    Receptionist,
    Admin,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            UserRole::Doctor | UserRole::Specialist | UserRole::Receptionist | UserRole::Admin
        )
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UserRole::Patient => "patient",
            UserRole::Doctor => "doctor",
            UserRole::Specialist => "specialist",
            UserRole::Receptionist => "receptionist",
            UserRole::Admin => "admin",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub iss: Option<String>,
    pub iat: Option<u64>,
    pub exp: Option<u64>,
}

/// Identity attached to the request by the auth middleware and passed
/// explicitly through the call chain. Never read from global state.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Row shape of the `users` table. The password hash never serializes
/// back out of the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl UserAccount {
    pub fn to_authenticated(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            id: self.meta.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub expires_at: Option<DateTime<Utc>>,
}
