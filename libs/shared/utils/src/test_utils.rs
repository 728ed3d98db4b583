use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::UserRole;

use crate::jwt::issue_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub database_url: String,
    pub database_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            database_url: "http://localhost:54321".to_string(),
            database_api_key: "test-api-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a wiremock gateway.
    pub fn for_gateway(url: &str) -> Self {
        Self {
            database_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_url: self.database_url.clone(),
            database_api_key: self.database_api_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_issuer: "hospital-api".to_string(),
            token_ttl_minutes: 60,
            clinic_utc_offset_hours: -5,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", UserRole::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            role,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, UserRole::Patient)
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, UserRole::Doctor)
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, UserRole::Receptionist)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, UserRole::Admin)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str) -> String {
        issue_token(user.id, &user.email, user.role, "hospital-api", 60, secret)
            .expect("test token")
            .token
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        issue_token(user.id, &user.email, user.role, "hospital-api", -60, secret)
            .expect("test token")
            .token
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        issue_token(user.id, &user.email, user.role, "hospital-api", 60, "wrong-secret")
            .expect("test token")
            .token
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock tests.
pub struct MockGatewayResponses;

impl MockGatewayResponses {
    /// Row returned by the token guard's `users?id=eq.{id}` lookup.
    pub fn user_account_row(user: &TestUser) -> serde_json::Value {
        json!({
            "id": user.id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": null,
            "created_by": null,
            "updated_by": null,
            "email": user.email,
            "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$placeholder",
            "full_name": user.full_name,
            "role": user.role,
            "is_active": true
        })
    }

    pub fn deactivated_user_account_row(user: &TestUser) -> serde_json::Value {
        let mut row = Self::user_account_row(user);
        row["is_active"] = json!(false);
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.database_url, "http://localhost:54321");
        assert_eq!(app_config.database_api_key, "test-api-key");
        assert!(!app_config.jwt_secret.is_empty());
    }

    #[test]
    fn test_tokens_verify_against_config_secret() {
        let config = TestConfig::default();
        let user = TestUser::doctor("doc@example.com");

        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
        let claims = validate_token(&token, &config.jwt_secret).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, UserRole::Doctor);
    }

    #[test]
    fn test_account_row_matches_model() {
        let user = TestUser::admin("admin@example.com");
        let row = MockGatewayResponses::user_account_row(&user);

        let account: shared_models::auth::UserAccount =
            serde_json::from_value(row).unwrap();
        assert_eq!(account.meta.id, user.id);
        assert!(account.is_active);
    }
}
