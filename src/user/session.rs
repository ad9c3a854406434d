//! Signed session tokens.
//!
//! Tokens are HS256 JWTs whose subject is the user id. Verification only
//! proves the token was issued by this daemon and has not expired; callers
//! still have to check the user exists.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of a session token
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session token has expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    Invalid(String),

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing secret plus token lifetime
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user
    pub fn issue_token(&self, user_id: &str) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new("secret", Duration::hours(1));
        let token = keys.issue_token("user-1").unwrap();
        let claims = keys.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_rejects_other_secret() {
        let keys = SessionKeys::new("secret", Duration::hours(1));
        let other = SessionKeys::new("different", Duration::hours(1));
        let token = other.issue_token("user-1").unwrap();
        assert!(matches!(
            keys.verify_token(&token),
            Err(SessionError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_expired() {
        let keys = SessionKeys::new("secret", Duration::hours(-1));
        let token = keys.issue_token("user-1").unwrap();
        assert!(matches!(keys.verify_token(&token), Err(SessionError::Expired)));
    }

    #[test]
    fn test_rejects_garbage() {
        let keys = SessionKeys::new("secret", Duration::hours(1));
        assert!(keys.verify_token("not.a.token").is_err());
    }
}
