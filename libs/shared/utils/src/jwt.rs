use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, JwtHeader, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Rejection categories for bearer tokens. Every category surfaces to the
/// client as the same 401; the distinction exists for the guard's logging.
/// `SecretMissing` is a server misconfiguration, not a client fault, and
/// maps to an internal error instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("JWT secret is not configured")]
    SecretMissing,
}

impl TokenError {
    pub fn category(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed",
            TokenError::InvalidSignature => "invalid signature",
            TokenError::Expired => "expired",
            TokenError::SecretMissing => "secret missing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs an HS256 token for a resolved account. Claims carry the user id
/// as `sub` plus email, role and issuer; `exp` is always stamped.
pub fn issue_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    issuer: &str,
    ttl_minutes: i64,
    jwt_secret: &str,
) -> Result<IssuedToken, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::SecretMissing);
    }

    let now = Utc::now();
    let expires_at = now + Duration::minutes(ttl_minutes);

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "sub": user_id.to_string(),
        "email": email,
        "role": role,
        "iss": issuer,
        "iat": now.timestamp(),
        "exp": expires_at.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::SecretMissing)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(IssuedToken {
        token: format!("{}.{}", signing_input, signature_b64),
        expires_at,
    })
}

/// Verifies signature and expiry and returns the claims. Tokens without an
/// `exp` claim are rejected as malformed; the guard fails closed on every
/// anomaly.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<JwtClaims, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::SecretMissing);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed(
            "expected three token segments".to_string(),
        ));
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| TokenError::Malformed("invalid header encoding".to_string()))?;

    let header: JwtHeader = serde_json::from_str(&header_json)
        .map_err(|_| TokenError::Malformed("invalid header payload".to_string()))?;
    if header.alg != "HS256" {
        return Err(TokenError::Malformed(format!(
            "unsupported algorithm '{}'",
            header.alg
        )));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        TokenError::Malformed("invalid signature encoding".to_string())
    })?;

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::SecretMissing)?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::InvalidSignature);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| TokenError::Malformed("invalid claims encoding".to_string()))?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        TokenError::Malformed("invalid claims payload".to_string())
    })?;

    let exp = claims
        .exp
        .ok_or_else(|| TokenError::Malformed("missing expiry claim".to_string()))?;
    let now = Utc::now().timestamp() as u64;
    if exp < now {
        debug!("Token expired at {} (now: {})", exp, now);
        return Err(TokenError::Expired);
    }

    debug!("Token validated successfully for subject: {}", claims.sub);
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-key-long-enough-for-hs256";

    fn issue(ttl_minutes: i64) -> IssuedToken {
        issue_token(
            Uuid::new_v4(),
            "patient@example.com",
            UserRole::Patient,
            "hospital-api",
            ttl_minutes,
            SECRET,
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let user_id = Uuid::new_v4();
        let issued = issue_token(
            user_id,
            "doc@example.com",
            UserRole::Doctor,
            "hospital-api",
            60,
            SECRET,
        )
        .unwrap();

        let claims = validate_token(&issued.token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "doc@example.com");
        assert_eq!(claims.role, UserRole::Doctor);
        assert_eq!(claims.iss.as_deref(), Some("hospital-api"));
        assert_eq!(claims.exp, Some(issued.expires_at.timestamp() as u64));
    }

    #[test]
    fn test_expired_token_categorized() {
        let issued = issue(-10);
        let err = validate_token(&issued.token, SECRET).unwrap_err();
        assert_eq!(err, TokenError::Expired);
        assert_eq!(err.category(), "expired");
    }

    #[test]
    fn test_wrong_key_categorized() {
        let issued = issue(60);
        let err = validate_token(&issued.token, "some-other-secret").unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
        assert_eq!(err.category(), "invalid signature");
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = validate_token("not-even-a-token", SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
        assert_eq!(err.category(), "malformed");
    }

    #[test]
    fn test_tampered_claims_fail_signature() {
        let issued = issue(60);
        let mut parts: Vec<String> = issued.token.split('.').map(String::from).collect();
        let forged = json!({
            "sub": Uuid::new_v4().to_string(),
            "email": "admin@example.com",
            "role": "admin",
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        });
        parts[1] = URL_SAFE_NO_PAD.encode(forged.to_string());
        let tampered = parts.join(".");

        let err = validate_token(&tampered, SECRET).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_missing_expiry_rejected() {
        // Hand-rolled token without an exp claim.
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let claims = URL_SAFE_NO_PAD.encode(
            json!({
                "sub": Uuid::new_v4().to_string(),
                "email": "x@example.com",
                "role": "patient",
            })
            .to_string(),
        );
        let signing_input = format!("{}.{}", header, claims);
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signing_input.as_bytes());
        let token = format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        );

        let err = validate_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn test_unknown_role_rejected_as_malformed() {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let claims = URL_SAFE_NO_PAD.encode(
            json!({
                "sub": Uuid::new_v4().to_string(),
                "email": "x@example.com",
                "role": "superuser",
                "exp": (Utc::now() + Duration::hours(1)).timestamp(),
            })
            .to_string(),
        );
        let signing_input = format!("{}.{}", header, claims);
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signing_input.as_bytes());
        let token = format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        );

        let err = validate_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        let issued = issue(60);
        let err = validate_token(&issued.token, "").unwrap_err();
        assert_eq!(err, TokenError::SecretMissing);
    }
}
