use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the authentication services.
///
/// Failed logins collapse into a single [`AuthError::InvalidCredentials`]
/// regardless of whether the email was unknown, the password wrong, or the
/// account deactivated, so responses never reveal which part failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email {0} is already registered")]
    EmailTaken(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Token issue failed: {0}")]
    TokenIssue(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}
