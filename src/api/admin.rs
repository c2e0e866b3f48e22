//! User administration under `/api/admin` (admin only).

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery};
use super::validation::{
    page_params, parse_role, require_present, validate_id, validate_search_query,
};
use super::{ApiError, ApiMessage, AppState, StatsBody};
use crate::db::UserFilter;
use crate::models::{CurrentUser, PublicUser};
use crate::services::{AdminUpdate, CreateUser, UserDetail};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub role: Option<String>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserDetailBody {
    pub user: UserDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
    pub user: PublicUser,
    pub is_active: bool,
}

fn parse_active(raw: Option<&str>) -> Result<Option<bool>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(ApiError::validation("isActive must be true or false")),
    }
}

/// `GET /api/admin/stats`
pub async fn user_counts(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let stats = state.user_admin_service().counts().await?;
    Ok(ApiMessage::new("OK", StatsBody { stats }).into_response())
}

/// `GET /api/admin`
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<Response, ApiError> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = UserFilter {
        role: query
            .role
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(parse_role)
            .transpose()?,
        is_active: parse_active(query.is_active.as_deref())?,
        search: validate_search_query(query.search.as_deref()),
        page,
        limit,
    };

    let list = state.user_admin_service().list(filter).await?;
    Ok(ApiMessage::new("OK", list).into_response())
}

/// `GET /api/admin/{id}`
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    let user = state.user_admin_service().get(id).await?;
    Ok(ApiMessage::new("OK", UserDetailBody { user }).into_response())
}

/// `POST /api/admin`
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let required = "Email and password are required";
    let email = require_present(payload.email.as_deref(), required)?.to_string();
    let password = require_present(payload.password.as_deref(), required)?.to_string();
    let role = payload.role.as_deref().map(parse_role).transpose()?;

    let user = state
        .user_admin_service()
        .create(CreateUser {
            name: payload.name,
            email,
            password,
            role,
            is_active: payload.is_active,
        })
        .await?;

    Ok(ApiMessage::new("User created successfully", UserBody { user }).created())
}

/// `PUT /api/admin/{id}`
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    actor: CurrentUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    let role = payload.role.as_deref().map(parse_role).transpose()?;

    let user = state
        .user_admin_service()
        .update(
            &actor.id,
            id,
            AdminUpdate {
                name: payload.name,
                email: payload.email,
                role,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok(ApiMessage::new("User updated successfully", UserBody { user }).into_response())
}

/// `DELETE /api/admin/{id}`
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    actor: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    state.user_admin_service().delete(&actor.id, id).await?;
    Ok(ApiMessage::only("User deleted successfully").into_response())
}

/// `POST /api/admin/{id}/reset-password`
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    let new_password = payload.new_password.unwrap_or_default();

    state
        .user_admin_service()
        .reset_password(id, &new_password)
        .await?;
    Ok(ApiMessage::only("Password reset successfully").into_response())
}

/// `POST /api/admin/{id}/toggle-active`
pub async fn toggle_active(
    State(state): State<Arc<AppState>>,
    actor: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    let user = state.user_admin_service().toggle_active(&actor.id, id).await?;

    let is_active = user.is_active;
    let message = if is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(ApiMessage::new(message, ToggleBody { user, is_active }).into_response())
}
