//! `SeaORM` implementation of the `UserAdminService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{NewUser, ProfileChanges, Store, UserFilter, is_unique_violation};
use crate::entities::users;
use crate::models::{PublicUser, Role};
use crate::services::auth_service::{normalize_email, validate_password};
use crate::services::password;
use crate::services::user_admin_service::{
    AdminUpdate, CreateUser, Pagination, UserAdminError, UserAdminService, UserCounts,
    UserDetail, UserList,
};

pub struct SeaOrmUserAdminService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmUserAdminService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    async fn load(&self, id: &str) -> Result<users::Model, UserAdminError> {
        self.store
            .users()
            .get_by_id(id)
            .await?
            .ok_or(UserAdminError::NotFound)
    }
}

fn email_or_invalid(raw: &str) -> Result<String, UserAdminError> {
    normalize_email(raw)
        .ok_or_else(|| UserAdminError::Validation("Invalid email address".to_string()))
}

fn password_or_invalid(password: &str) -> Result<(), UserAdminError> {
    validate_password(password).map_err(|e| UserAdminError::Validation(e.to_string()))
}

#[async_trait]
impl UserAdminService for SeaOrmUserAdminService {
    async fn counts(&self) -> Result<UserCounts, UserAdminError> {
        let stats = self.store.stats();
        let ((total, active), by_role) = tokio::try_join!(stats.user_totals(), stats.users_by_role())?;

        Ok(UserCounts {
            total,
            active,
            inactive: total.saturating_sub(active),
            by_role,
        })
    }

    async fn list(&self, filter: UserFilter) -> Result<UserList, UserAdminError> {
        let page = self.store.users().list(&filter).await?;

        Ok(UserList {
            users: page.users.into_iter().map(PublicUser::from).collect(),
            pagination: Pagination::new(page.total, filter.page, filter.limit),
        })
    }

    async fn get(&self, id: &str) -> Result<UserDetail, UserAdminError> {
        let user = self.load(id).await?;
        let request_count = self.store.users().request_count(id).await?;

        Ok(UserDetail {
            user: PublicUser::from(user),
            request_count,
        })
    }

    async fn create(&self, input: CreateUser) -> Result<PublicUser, UserAdminError> {
        let email = email_or_invalid(&input.email)?;
        password_or_invalid(&input.password)?;

        let users = self.store.users();
        if users.email_taken(&email, None).await? {
            return Err(UserAdminError::EmailTaken);
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
                role: input.role.unwrap_or(Role::Agent),
                is_active: input.is_active.unwrap_or(true),
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    UserAdminError::EmailTaken
                } else {
                    e.into()
                }
            })?;

        info!(user_id = %user.id, role = %user.role, "User created by admin");
        Ok(PublicUser::from(user))
    }

    async fn update(
        &self,
        actor_id: &str,
        id: &str,
        input: AdminUpdate,
    ) -> Result<PublicUser, UserAdminError> {
        let user = self.load(id).await?;
        let users = self.store.users();

        if actor_id == id {
            if input.is_active == Some(false) {
                return Err(UserAdminError::SelfAction(
                    "Cannot deactivate your own account".to_string(),
                ));
            }
            if input.role.is_some_and(|r| r != Role::Admin) {
                return Err(UserAdminError::SelfAction(
                    "Cannot change your own role".to_string(),
                ));
            }
        }

        let email = match input.email {
            Some(raw) => {
                let email = email_or_invalid(&raw)?;
                if email != user.email && users.email_taken(&email, Some(id)).await? {
                    return Err(UserAdminError::EmailTaken);
                }
                Some(email)
            }
            None => None,
        };
        if let Some(name) = &input.name
            && name.trim().is_empty()
        {
            return Err(UserAdminError::Validation("Name cannot be empty".to_string()));
        }

        let updated = users
            .update_profile(
                user,
                ProfileChanges {
                    name: input.name.map(|n| n.trim().to_string()),
                    email,
                    role: input.role,
                    is_active: input.is_active,
                    ..ProfileChanges::default()
                },
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    UserAdminError::EmailTaken
                } else {
                    e.into()
                }
            })?;

        info!(user_id = id, actor = actor_id, "User updated by admin");
        Ok(PublicUser::from(updated))
    }

    async fn delete(&self, actor_id: &str, id: &str) -> Result<(), UserAdminError> {
        if actor_id == id {
            return Err(UserAdminError::SelfAction(
                "Cannot delete your own account".to_string(),
            ));
        }

        self.load(id).await?;

        let users = self.store.users();
        let owned = users.request_count(id).await?;
        if owned > 0 {
            return Err(UserAdminError::HasRequests(owned));
        }

        users.delete(id).await?;
        info!(user_id = id, actor = actor_id, "User deleted");
        Ok(())
    }

    async fn reset_password(&self, id: &str, new_password: &str) -> Result<(), UserAdminError> {
        password_or_invalid(new_password)?;

        let user = self.load(id).await?;
        let hash = password::hash(new_password, &self.security).await?;
        self.store.users().set_password_hash(user, hash).await?;

        info!(user_id = id, "Password reset by admin");
        Ok(())
    }

    async fn toggle_active(&self, actor_id: &str, id: &str) -> Result<PublicUser, UserAdminError> {
        if actor_id == id {
            return Err(UserAdminError::SelfAction(
                "Cannot deactivate your own account".to_string(),
            ));
        }

        let user = self.load(id).await?;
        let is_active = !user.is_active;
        let updated = self.store.users().set_active(user, is_active).await?;

        info!(user_id = id, is_active, "User active state toggled");
        Ok(PublicUser::from(updated))
    }
}
