//! Domain service for admin-side account management.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::db::UserFilter;
use crate::models::{PublicUser, Role};

#[derive(Debug, Error)]
pub enum UserAdminError {
    #[error("User not found")]
    NotFound,

    /// An admin acting on their own account in a way that could lock them out.
    #[error("{0}")]
    SelfAction(String),

    #[error("Cannot delete user. They own {0} request(s)")]
    HasRequests(u64),

    #[error("Email already in use")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserAdminError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserAdminError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub by_role: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl Pagination {
    #[must_use]
    pub const fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: if limit == 0 { 0 } else { total.div_ceil(limit) },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: PublicUser,
    pub request_count: u64,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AdminUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[async_trait::async_trait]
pub trait UserAdminService: Send + Sync {
    async fn counts(&self) -> Result<UserCounts, UserAdminError>;

    /// Newest first, paginated.
    async fn list(&self, filter: UserFilter) -> Result<UserList, UserAdminError>;

    async fn get(&self, id: &str) -> Result<UserDetail, UserAdminError>;

    async fn create(&self, input: CreateUser) -> Result<PublicUser, UserAdminError>;

    /// # Errors
    ///
    /// Returns [`UserAdminError::SelfAction`] when `actor_id` tries to
    /// deactivate or demote themselves.
    async fn update(
        &self,
        actor_id: &str,
        id: &str,
        input: AdminUpdate,
    ) -> Result<PublicUser, UserAdminError>;

    /// Refused for the caller's own account and for users owning requests.
    async fn delete(&self, actor_id: &str, id: &str) -> Result<(), UserAdminError>;

    async fn reset_password(&self, id: &str, new_password: &str) -> Result<(), UserAdminError>;

    async fn toggle_active(&self, actor_id: &str, id: &str) -> Result<PublicUser, UserAdminError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_rounds_up() {
        let page = Pagination::new(21, 2, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Pagination::new(0, 1, 10).total_pages, 0);
        assert_eq!(Pagination::new(10, 1, 10).total_pages, 1);
    }
}
