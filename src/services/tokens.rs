//! Signed access/refresh token pairs (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::models::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// No token, or not a JWT at all.
    #[error("Authentication required")]
    Unauthenticated,

    /// Expired, wrong signature or wrong kind.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenService {
    access: Keys,
    refresh: Keys,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: Keys::new(&config.access_secret, Duration::hours(config.access_ttl_hours)),
            refresh: Keys::new(
                &config.refresh_secret,
                Duration::days(config.refresh_ttl_days),
            ),
        }
    }

    pub fn issue_pair(&self, user_id: &str, email: &str, role: Role) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: Self::sign(&self.access, TokenKind::Access, user_id, email, role)?,
            refresh_token: Self::sign(&self.refresh, TokenKind::Refresh, user_id, email, role)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        Self::verify(&self.access, TokenKind::Access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        Self::verify(&self.refresh, TokenKind::Refresh, token)
    }

    fn sign(
        keys: &Keys,
        kind: TokenKind,
        user_id: &str,
        email: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + keys.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(keys: &Keys, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Unauthenticated);
        }

        let claims = decode::<Claims>(token, &keys.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => {
                    TokenError::Unauthenticated
                }
                _ => TokenError::InvalidToken,
            })?;

        if claims.kind != kind {
            return Err(TokenError::InvalidToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default())
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let tokens = service();
        let pair = tokens.issue_pair("user-1", "a@b.c", Role::Agent).unwrap();

        let claims = tokens.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Agent);
        assert_eq!(claims.kind, TokenKind::Access);

        let claims = tokens.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(claims.exp > Utc::now().timestamp() + 6 * 24 * 3600);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue_pair("user-1", "a@b.c", Role::Va).unwrap();

        assert_eq!(
            tokens.verify_access(&pair.refresh_token).unwrap_err(),
            TokenError::InvalidToken
        );
        assert_eq!(
            tokens.verify_refresh(&pair.access_token).unwrap_err(),
            TokenError::InvalidToken
        );
    }

    #[test]
    fn test_malformed_and_missing_tokens() {
        let tokens = service();
        assert_eq!(
            tokens.verify_access("").unwrap_err(),
            TokenError::Unauthenticated
        );
        assert_eq!(
            tokens.verify_access("invalid.token.here").unwrap_err(),
            TokenError::Unauthenticated
        );
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let config = AuthConfig {
            access_ttl_hours: -1,
            ..AuthConfig::default()
        };
        let tokens = TokenService::new(&config);
        let pair = tokens.issue_pair("user-1", "a@b.c", Role::Admin).unwrap();

        assert_eq!(
            tokens.verify_access(&pair.access_token).unwrap_err(),
            TokenError::InvalidToken
        );
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let other = TokenService::new(&AuthConfig {
            access_secret: "someone-else".to_string(),
            ..AuthConfig::default()
        });
        let pair = other.issue_pair("user-1", "a@b.c", Role::Admin).unwrap();

        assert_eq!(
            service().verify_access(&pair.access_token).unwrap_err(),
            TokenError::InvalidToken
        );
    }
}
