//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::{AuthConfig, SecurityConfig};
use crate::db::{NewUser, ProfileChanges, Store, format_timestamp, is_unique_violation};
use crate::entities::users;
use crate::models::{PublicUser, Role};
use crate::services::auth_service::{
    AuthError, AuthService, AuthSession, RegisterInput, normalize_email, validate_password,
};
use crate::services::notifications::{NotificationDispatcher, NotificationEvent};
use crate::services::password;
use crate::services::tokens::{TokenError, TokenService};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenService>,
    auth: AuthConfig,
    security: SecurityConfig,
    notifications: NotificationDispatcher,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<TokenService>,
        auth: AuthConfig,
        security: SecurityConfig,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            tokens,
            auth,
            security,
            notifications,
        }
    }

    fn session(&self, user: users::Model) -> Result<AuthSession, AuthError> {
        let user = PublicUser::from(user);
        let tokens = self.tokens.issue_pair(&user.id, &user.email, user.role)?;
        Ok(AuthSession { user, tokens })
    }

    async fn load(&self, user_id: &str) -> Result<users::Model, AuthError> {
        self.store
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

fn email_or_invalid(raw: &str) -> Result<String, AuthError> {
    normalize_email(raw).ok_or_else(|| AuthError::Validation("Invalid email address".to_string()))
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError> {
        let email = email_or_invalid(&input.email)?;
        validate_password(&input.password)?;

        let role = input.role.unwrap_or(Role::Agent);
        if role == Role::Admin {
            return Err(AuthError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        let users = self.store.users();
        if users.email_taken(&email, None).await? {
            return Err(AuthError::EmailTaken);
        }

        let name = input
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let password_hash = password::hash(&input.password, &self.security).await?;
        let user = users
            .create(NewUser {
                name,
                email,
                password_hash,
                role,
                is_active: true,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::EmailTaken
                } else {
                    e.into()
                }
            })?;

        info!(user_id = %user.id, role = %role, "User registered");
        self.session(user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let Some(email) = normalize_email(email) else {
            return Err(AuthError::InvalidCredentials);
        };

        let users = self.store.users();
        let user = users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        if !password::verify(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let user = users.touch_last_login(user).await?;
        info!(user_id = %user.id, "User logged in");
        self.session(user)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let user = self
            .store
            .users()
            .get_by_id(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::Token(TokenError::InvalidToken))?;

        self.session(user)
    }

    async fn me(&self, user_id: &str) -> Result<PublicUser, AuthError> {
        Ok(PublicUser::from(self.load(user_id).await?))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        mut changes: ProfileChanges,
    ) -> Result<PublicUser, AuthError> {
        let user = self.load(user_id).await?;
        let users = self.store.users();

        changes.role = None;
        changes.is_active = None;

        if let Some(raw) = changes.email.take() {
            let email = email_or_invalid(&raw)?;
            if email != user.email && users.email_taken(&email, Some(user_id)).await? {
                return Err(AuthError::EmailTaken);
            }
            changes.email = Some(email);
        }
        if let Some(name) = &changes.name
            && name.trim().is_empty()
        {
            return Err(AuthError::Validation("Name cannot be empty".to_string()));
        }

        let updated = users.update_profile(user, changes).await.map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailTaken
            } else {
                e.into()
            }
        })?;
        Ok(PublicUser::from(updated))
    }

    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let user = self.load(user_id).await?;
        if !password::verify(old_password, &user.password_hash).await? {
            return Err(AuthError::Validation("Old password is incorrect".to_string()));
        }

        let hash = password::hash(new_password, &self.security).await?;
        self.store.users().set_password_hash(user, hash).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    async fn toggle_two_factor(&self, user_id: &str) -> Result<PublicUser, AuthError> {
        let user = self.load(user_id).await?;
        let enabled = !user.two_factor_enabled;
        let updated = self.store.users().set_two_factor(user, enabled).await?;
        Ok(PublicUser::from(updated))
    }

    async fn forgot_password(&self, email: &str) -> Result<Option<String>, AuthError> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };

        let users = self.store.users();
        let Some(user) = users.get_by_email(&email).await? else {
            return Ok(None);
        };

        let token = password::generate_reset_token();
        let expires_at = format_timestamp(
            Utc::now() + Duration::minutes(self.auth.reset_token_ttl_minutes),
        );
        let name = user.name.clone();

        users
            .set_reset_token(user, password::digest_token(&token), expires_at)
            .await?;

        self.notifications.dispatch(NotificationEvent::PasswordReset {
            name,
            email,
            token: token.clone(),
            expires_minutes: self.auth.reset_token_ttl_minutes,
        });

        Ok(self.auth.expose_reset_token.then_some(token))
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidResetToken);
        }
        validate_password(new_password)?;

        let users = self.store.users();
        let user = users
            .get_by_reset_token(&password::digest_token(token.trim()))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let hash = password::hash(new_password, &self.security).await?;
        let user_id = user.id.clone();
        users.set_password_hash(user, hash).await?;

        info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<bool, AuthError> {
        let email = email_or_invalid(email)?;
        validate_password(password)?;

        let users = self.store.users();
        if users.email_taken(&email, None).await? {
            return Ok(false);
        }

        let password_hash = password::hash(password, &self.security).await?;
        let user = users
            .create(NewUser {
                name: name.unwrap_or("Administrator").to_string(),
                email,
                password_hash,
                role: Role::Admin,
                is_active: true,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "Admin account created");
        Ok(true)
    }
}
