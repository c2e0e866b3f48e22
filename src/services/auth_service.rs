//! Domain service for accounts: registration, login, token refresh,
//! self-service profile changes and password recovery.

use serde::Serialize;
use thiserror::Error;

use crate::db::ProfileChanges;
use crate::models::{PublicUser, Role};
use crate::services::password::MIN_PASSWORD_LEN;
use crate::services::tokens::{TokenError, TokenPair};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0}")]
    Forbidden(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Trims and lowercases; `None` if it does not look like an address.
#[must_use]
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;

    let valid = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace);

    valid.then_some(email)
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// A user plus a freshly issued token pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an agent or VA account. Admin accounts cannot be self-assigned.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailTaken`] for a duplicate address and
    /// [`AuthError::Forbidden`] when `admin` is requested.
    async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email, an
    /// inactive account or a wrong password, without saying which.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    async fn me(&self, user_id: &str) -> Result<PublicUser, AuthError>;

    /// Role and active state are ignored here.
    async fn update_profile(
        &self,
        user_id: &str,
        changes: ProfileChanges,
    ) -> Result<PublicUser, AuthError>;

    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    async fn toggle_two_factor(&self, user_id: &str) -> Result<PublicUser, AuthError>;

    /// Always succeeds for well-formed input, whether or not the address is
    /// known. Returns the raw token only when development exposure is on.
    async fn forgot_password(&self, email: &str) -> Result<Option<String>, AuthError>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError>;

    /// Creates an active admin unless the email is already taken. Returns
    /// whether a user was created.
    async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<bool, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Xena@Example.COM ").as_deref(),
            Some("xena@example.com")
        );
        assert!(normalize_email("no-at-sign").is_none());
        assert!(normalize_email("@example.com").is_none());
        assert!(normalize_email("x@localhost").is_none());
        assert!(normalize_email("x@.com").is_none());
        assert!(normalize_email("x y@example.com").is_none());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678").is_ok());
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::Validation(_))
        ));
    }
}
