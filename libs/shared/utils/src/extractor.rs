use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};
use shared_models::auth::{AuthenticatedUser, UserAccount};
use shared_models::error::{AppError, ErrorBody};

use crate::jwt::{validate_token, TokenError};

/// Token guard. Verifies the bearer token, then confirms the subject still
/// exists and is active before the request reaches a handler. Rejections
/// never reveal whether the account exists; every anomaly fails closed.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    let claims = validate_token(token, &config.jwt_secret).map_err(|e| match e {
        TokenError::SecretMissing => {
            warn!("Token validation unavailable: JWT secret not configured");
            AppError::Internal("Token validation unavailable".to_string())
        }
        other => {
            warn!(category = other.category(), "Rejected bearer token");
            AppError::Auth("Invalid or expired token".to_string())
        }
    })?;

    let user = resolve_account(&config, token, &claims.sub).await?;
    debug!(user_id = %user.id, role = %user.role, "Request authenticated");

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Loads the token's subject from the users table and checks the active
/// flag. A missing or deactivated account is indistinguishable from a bad
/// token on the wire.
async fn resolve_account(
    config: &AppConfig,
    token: &str,
    subject: &str,
) -> Result<AuthenticatedUser, AppError> {
    let user_id = Uuid::parse_str(subject)
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;

    let client = PostgrestClient::new(config);
    let path = format!("/rest/v1/users?id=eq.{}&limit=1", user_id);

    let rows: Vec<UserAccount> = client
        .request(Method::GET, &path, Some(token), None)
        .await
        .map_err(|e| match e {
            DbError::Unauthorized(msg) => {
                warn!("Gateway rejected token during account lookup: {}", msg);
                AppError::Auth("Invalid or expired token".to_string())
            }
            other => {
                warn!("Account lookup failed: {}", other);
                AppError::Internal("Authentication backend unavailable".to_string())
            }
        })?;

    let account = rows
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Auth("Invalid or unknown user".to_string()))?;

    if !account.is_active {
        warn!(user_id = %account.meta.id, "Deactivated account presented a valid token");
        return Err(AppError::Auth("Invalid or unknown user".to_string()));
    }

    Ok(account.to_authenticated())
}

/// Root-level layer that stamps the request path into error payloads.
/// `AppError::into_response` leaves `path` empty because the conversion
/// happens outside request context.
pub async fn attach_error_path(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    if let Some(mut body) = response.extensions_mut().remove::<ErrorBody>() {
        body.path = Some(path);
        let status = response.status();
        return (status, Json(body)).into_response();
    }

    response
}
