use reqwest::Method;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};
use shared_models::auth::{UserAccount, UserRole};
use shared_utils::jwt::{self, IssuedToken};

use crate::models::{AuthError, LoginRequest, RegisterRequest};
use crate::password;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Credential checks, account creation and token issue behind the public
/// `/auth` surface.
pub struct AuthService {
    db: PostgrestClient,
    config: AppConfig,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            config: config.clone(),
        }
    }

    /// Resolves an email/password pair to an account plus a signed token.
    ///
    /// Unknown email, wrong password and deactivated account all fail with
    /// the same [`AuthError::InvalidCredentials`].
    pub async fn login(
        &self,
        request: LoginRequest,
    ) -> Result<(UserAccount, IssuedToken), AuthError> {
        let email = request.email.trim().to_lowercase();

        let account = match self.find_by_email(&email).await? {
            Some(account) => account,
            None => return Err(AuthError::InvalidCredentials),
        };

        if !account.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let password_ok = password::verify_password(&request.password, &account.password_hash)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.issue_for(&account)?;
        info!(user_id = %account.meta.id, "Login succeeded");

        Ok((account, issued))
    }

    /// Creates a patient account and signs the first token for it.
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<(UserAccount, IssuedToken), AuthError> {
        let email = request.email.trim().to_lowercase();
        let full_name = request.full_name.trim().to_string();
        validate_registration(&email, &request.password, &full_name)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let password_hash = password::hash_password(&request.password)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let body = json!({
            "email": email,
            "password_hash": password_hash,
            "full_name": full_name,
            "role": UserRole::Patient,
            "is_active": true,
        });

        // The unique index on users.email is the last word; a concurrent
        // registration that slips past the pre-check still lands here.
        let rows: Vec<UserAccount> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/users",
                None,
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation(_) => AuthError::EmailTaken(email.clone()),
                other => map_db_error(other),
            })?;

        let account = rows
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::DatabaseError("insert returned no account row".to_string()))?;

        let issued = self.issue_for(&account)?;
        info!(user_id = %account.meta.id, "Account registered");

        Ok((account, issued))
    }

    /// Loads the account row behind an authenticated user id.
    pub async fn get_account(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<UserAccount>, AuthError> {
        let path = format!("/rest/v1/users?id=eq.{}&limit=1", user_id);

        let rows: Vec<UserAccount> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        Ok(rows.into_iter().next())
    }

    // Lookup happens before any token exists, so the request rides on the
    // service key alone.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        let path = format!("/rest/v1/users?email=eq.{}&limit=1", email);

        let rows: Vec<UserAccount> = self
            .db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_db_error)?;

        Ok(rows.into_iter().next())
    }

    fn issue_for(&self, account: &UserAccount) -> Result<IssuedToken, AuthError> {
        jwt::issue_token(
            account.meta.id,
            &account.email,
            account.role,
            &self.config.jwt_issuer,
            self.config.token_ttl_minutes,
            &self.config.jwt_secret,
        )
        .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }
}

fn validate_registration(email: &str, password: &str, full_name: &str) -> Result<(), AuthError> {
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::ValidationError(
            "a valid email address is required".to_string(),
        ));
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if full_name.is_empty() {
        return Err(AuthError::ValidationError(
            "full name is required".to_string(),
        ));
    }

    Ok(())
}

fn map_db_error(err: DbError) -> AuthError {
    AuthError::DatabaseError(err.to_string())
}
