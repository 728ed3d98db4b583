use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::authorization::Bearer;
use headers::Authorization;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthenticatedUser, TokenResponse};
use shared_models::error::AppError;
use shared_utils::jwt::{self, TokenError};

use crate::models::{AuthError, LoginRequest, RegisterRequest};
use crate::service::AuthService;

fn map_auth_error(err: AuthError) -> AppError {
    match err {
        err @ AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
        err @ AuthError::EmailTaken(_) => AppError::Conflict(err.to_string()),
        AuthError::ValidationError(message) => AppError::ValidationError(message),
        AuthError::PasswordHash(message) => AppError::Internal(message),
        AuthError::TokenIssue(message) => AppError::Internal(message),
        AuthError::DatabaseError(message) => AppError::Database(message),
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let auth = AuthService::new(&state);
    let (account, issued) = auth.login(request).await.map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "token": issued.token,
        "expires_at": issued.expires_at,
        "user": account,
    })))
}

/// Self-service signup. Every account created here is a patient; staff
/// accounts are provisioned out of band.
#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let auth = AuthService::new(&state);
    let (account, issued) = auth.register(request).await.map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "token": issued.token,
        "expires_at": issued.expires_at,
        "user": account,
    })))
}

/// Standalone token check for other services and debugging. Verifies the
/// signature and expiry only; protected routes go through the guard, which
/// additionally confirms the account still exists and is active.
#[axum::debug_handler]
pub async fn validate_token(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<TokenResponse>, AppError> {
    let claims = jwt::validate_token(bearer.token(), &state.jwt_secret).map_err(|err| match err {
        TokenError::SecretMissing => AppError::Internal(err.to_string()),
        other => {
            debug!(category = other.category(), "Token rejected");
            AppError::Auth("Invalid or expired token".to_string())
        }
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;
    let expires_at = claims
        .exp
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp as i64, 0));

    Ok(Json(TokenResponse {
        valid: true,
        user_id,
        email: claims.email,
        role: claims.role,
        expires_at,
    }))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let account = AuthService::new(&state)
        .get_account(user.id, bearer.token())
        .await
        .map_err(map_auth_error)?
        .ok_or_else(|| AppError::Auth("Invalid or unknown user".to_string()))?;

    Ok(Json(json!(account)))
}
