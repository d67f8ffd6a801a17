//! Session credentials and the access-control gate.
//!
//! Issues and verifies the HS256 session token carried in an HTTP-only
//! cookie, hashes organization passwords, and provides the axum middleware
//! that authenticates a request and enforces a caller-supplied role
//! allow-list before any protected handler runs.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// The only role issued today. The gate still takes an allow-list so new
/// roles slot in without touching the middleware.
pub const ROLE_ORGANIZATION: &str = "organization";

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "authToken";

const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access token is missing")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Access denied: no permission")]
    Forbidden,
    #[error("Failed to process credentials: {0}")]
    Credential(String),
}

/// Hashes a plaintext password for storage. Never store or log the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::Credential(e.to_string()))
}

/// Checks a login attempt against the stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, password_hash).map_err(|e| AuthError::Credential(e.to_string()))
}

/// JWT payload: the authenticated organization and its role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token signing/verification keys plus the cookie policy, constructed once
/// from configuration and shared via `Arc`.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure_cookies: bool,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl: Duration, secure_cookies: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            secure_cookies,
        }
    }

    /// Issues a signed session token for the organization.
    pub fn issue(&self, organization_id: Uuid, role: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: organization_id,
            role: role.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Credential(e.to_string()))
    }

    /// Verifies signature and expiry, returning the decoded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// `Set-Cookie` value carrying the session token: HTTP-only,
    /// same-site-strict, expiring with the token.
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            self.ttl.as_secs()
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie (logout).
    pub fn clear_cookie(&self) -> String {
        let mut cookie =
            format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Extracts the session token from a `Cookie` request header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("authToken="))
        .filter(|token| !token.is_empty())
}

/// Identity attached to the request after the gate passes, read by handlers
/// via `Extension<AuthIdentity>`.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub organization_id: Uuid,
    pub role: String,
}

/// The access-control gate's state: verification keys plus the roles
/// allowed through this particular route group.
#[derive(Clone)]
pub struct RoleGate {
    keys: Arc<AuthKeys>,
    allowed: Arc<Vec<String>>,
}

impl RoleGate {
    pub fn new(keys: Arc<AuthKeys>, allowed_roles: &[&str]) -> Self {
        Self {
            keys,
            allowed: Arc::new(allowed_roles.iter().map(|r| r.to_string()).collect()),
        }
    }

    pub fn allows(&self, role: &str) -> bool {
        self.allowed.iter().any(|r| r == role)
    }
}

/// Middleware guarding protected routes.
///
/// Rejects requests without a session cookie (401), with an unverifiable or
/// expired token (401), or with a role outside the allow-list (403). On
/// success the decoded identity is attached to the request for downstream
/// handlers.
pub async fn authenticate_and_authorize(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_cookie_header);

    let Some(token) = token else {
        return error_response(StatusCode::UNAUTHORIZED, &AuthError::MissingToken);
    };

    let claims = match gate.keys.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("Authorization error: {err}");
            return error_response(StatusCode::UNAUTHORIZED, &AuthError::InvalidToken);
        }
    };

    if !gate.allows(&claims.role) {
        return error_response(StatusCode::FORBIDDEN, &AuthError::Forbidden);
    }

    req.extensions_mut().insert(AuthIdentity {
        organization_id: claims.sub,
        role: claims.role,
    });
    next.run(req).await
}

fn error_response(status: StatusCode, err: &AuthError) -> Response {
    (status, Json(serde_json::json!({ "message": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AuthKeys {
        AuthKeys::new("test-secret", Duration::from_secs(24 * 60 * 60), false)
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let keys = keys();
        let org = Uuid::new_v4();
        let token = keys.issue(org, ROLE_ORGANIZATION).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, org);
        assert_eq!(claims.role, ROLE_ORGANIZATION);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = keys().issue(Uuid::new_v4(), ROLE_ORGANIZATION).unwrap();
        let other = AuthKeys::new("different-secret", Duration::from_secs(60), false);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: ROLE_ORGANIZATION.to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(matches!(
            keys().verify("not-a-token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = keys().session_cookie("abc");
        assert!(cookie.starts_with("authToken=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        let secure = AuthKeys::new("s", Duration::from_secs(60), true).session_cookie("abc");
        assert!(secure.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = keys().clear_cookie();
        assert!(cookie.starts_with("authToken=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(
            token_from_cookie_header("authToken=abc.def.ghi"),
            Some("abc.def.ghi")
        );
        assert_eq!(
            token_from_cookie_header("theme=dark; authToken=tok; lang=en"),
            Some("tok")
        );
        assert_eq!(token_from_cookie_header("theme=dark"), None);
        assert_eq!(token_from_cookie_header("authToken="), None);
    }

    #[test]
    fn test_role_gate_allow_list() {
        let gate = RoleGate::new(Arc::new(keys()), &[ROLE_ORGANIZATION]);
        assert!(gate.allows("organization"));
        assert!(!gate.allows("admin"));
        assert!(!gate.allows(""));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("Str0ng!Pass1").unwrap();
        assert_ne!(hash, "Str0ng!Pass1");
        assert!(verify_password("Str0ng!Pass1", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }
}
