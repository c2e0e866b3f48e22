use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::db::{new_id, now};
use crate::entities::{requests, users};
use crate::models::Role;

pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Fields a user may change on their own profile, or an admin on anyone's.
/// `None` leaves the column untouched; an empty string clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub about: Option<String>,
    pub profile_image: Option<String>,
    pub social_links: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    /// 1-based
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<users::Model>,
    pub total: u64,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user: NewUser) -> Result<users::Model> {
        let timestamp = now();

        let active = users::ActiveModel {
            id: Set(new_id()),
            name: Set(user.name),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            role: Set(user.role.as_str().to_string()),
            is_active: Set(user.is_active),
            last_login_at: Set(None),
            two_factor_enabled: Set(false),
            password_reset_token_hash: Set(None),
            password_reset_expires: Set(None),
            position: Set(None),
            phone_number: Set(None),
            website: Set(None),
            about: Set(None),
            profile_image: Set(None),
            social_links: Set(None),
            created_at: Set(timestamp.clone()),
            updated_at: Set(timestamp),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    /// True when `email` belongs to some user other than `except_id`.
    pub async fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool> {
        let mut query = users::Entity::find().filter(users::Column::Email.eq(email));
        if let Some(id) = except_id {
            query = query.filter(users::Column::Id.ne(id));
        }

        let count = query
            .count(&self.conn)
            .await
            .context("Failed to check email uniqueness")?;

        Ok(count > 0)
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<UserPage> {
        let mut condition = Condition::all();

        if let Some(role) = filter.role {
            condition = condition.add(users::Column::Role.eq(role.as_str()));
        }
        if let Some(is_active) = filter.is_active {
            condition = condition.add(users::Column::IsActive.eq(is_active));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            let pattern = format!("%{}%", search.to_lowercase());
            condition = condition.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            users::Entity,
                            users::Column::Name,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            users::Entity,
                            users::Column::Email,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        let paginator = users::Entity::find()
            .filter(condition)
            .order_by_desc(users::Column::CreatedAt)
            .paginate(&self.conn, filter.limit.max(1));

        let total = paginator
            .num_items()
            .await
            .context("Failed to count users")?;
        let users = paginator
            .fetch_page(filter.page.saturating_sub(1))
            .await
            .context("Failed to list users")?;

        Ok(UserPage { users, total })
    }

    pub async fn update_profile(
        &self,
        user: users::Model,
        changes: ProfileChanges,
    ) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(position) = changes.position {
            active.position = Set(optional(position));
        }
        if let Some(phone_number) = changes.phone_number {
            active.phone_number = Set(optional(phone_number));
        }
        if let Some(website) = changes.website {
            active.website = Set(optional(website));
        }
        if let Some(about) = changes.about {
            active.about = Set(optional(about));
        }
        if let Some(profile_image) = changes.profile_image {
            active.profile_image = Set(optional(profile_image));
        }
        if let Some(links) = changes.social_links {
            active.social_links = Set(if links.is_null() {
                None
            } else {
                Some(links.to_string())
            });
        }
        active.updated_at = Set(now());

        active
            .update(&self.conn)
            .await
            .context("Failed to update user")
    }

    pub async fn set_password_hash(&self, user: users::Model, hash: String) -> Result<()> {
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash);
        active.password_reset_token_hash = Set(None);
        active.password_reset_expires = Set(None);
        active.updated_at = Set(now());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_active(&self, user: users::Model, is_active: bool) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(now());
        active
            .update(&self.conn)
            .await
            .context("Failed to update user status")
    }

    pub async fn set_two_factor(&self, user: users::Model, enabled: bool) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.two_factor_enabled = Set(enabled);
        active.updated_at = Set(now());
        active
            .update(&self.conn)
            .await
            .context("Failed to update two-factor flag")
    }

    pub async fn touch_last_login(&self, user: users::Model) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.last_login_at = Set(Some(now()));
        active
            .update(&self.conn)
            .await
            .context("Failed to record login")
    }

    pub async fn set_reset_token(
        &self,
        user: users::Model,
        token_hash: String,
        expires_at: String,
    ) -> Result<()> {
        let mut active: users::ActiveModel = user.into();
        active.password_reset_token_hash = Set(Some(token_hash));
        active.password_reset_expires = Set(Some(expires_at));
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Looks up the user holding an unexpired reset token with this hash.
    pub async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::PasswordResetTokenHash.eq(token_hash))
            .filter(users::Column::PasswordResetExpires.gt(now()))
            .one(&self.conn)
            .await
            .context("Failed to query user by reset token")
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = users::Entity::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(users::Entity::find().count(&self.conn).await?)
    }

    pub async fn count_by_role(&self, role: Role) -> Result<u64> {
        Ok(users::Entity::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .count(&self.conn)
            .await?)
    }

    pub async fn count_active(&self, is_active: bool) -> Result<u64> {
        Ok(users::Entity::find()
            .filter(users::Column::IsActive.eq(is_active))
            .count(&self.conn)
            .await?)
    }

    pub async fn request_count(&self, user_id: &str) -> Result<u64> {
        Ok(requests::Entity::find()
            .filter(requests::Column::AgentId.eq(user_id))
            .count(&self.conn)
            .await?)
    }
}
