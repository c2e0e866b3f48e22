//! Account endpoints under `/api/user`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::ApiJson;
use super::validation::{parse_role, require_present, validate_id};
use super::{ApiError, ApiMessage, AppState};
use crate::db::ProfileChanges;
use crate::models::{CurrentUser, PublicUser};
use crate::services::RegisterInput;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub about: Option<String>,
    pub profile_image: Option<String>,
    pub social_links: Option<serde_json::Value>,
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            position: req.position,
            phone_number: req.phone_number,
            website: req.website,
            about: req.about,
            profile_image: req.profile_image,
            social_links: req.social_links,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorBody {
    pub two_factor_enabled: bool,
}

fn credentials<'a>(
    email: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), ApiError> {
    let message = "Email and password are required";
    Ok((
        require_present(email, message)?,
        require_present(password, message)?,
    ))
}

/// `POST /api/user/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let (email, password) = credentials(payload.email.as_deref(), payload.password.as_deref())?;
    let role = payload.role.as_deref().map(parse_role).transpose()?;

    let session = state
        .auth_service()
        .register(RegisterInput {
            name: payload.name,
            email: email.to_string(),
            password: password.to_string(),
            role,
        })
        .await?;

    Ok(ApiMessage::new("Signup processed", session).created())
}

/// `POST /api/user/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let (email, password) = credentials(payload.email.as_deref(), payload.password.as_deref())?;
    let session = state.auth_service().login(email, password).await?;
    Ok(ApiMessage::new("Login processed", session).into_response())
}

/// `POST /api/user/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Response, ApiError> {
    let token = require_present(payload.refresh_token.as_deref(), "Missing refreshToken")?;
    let session = state.auth_service().refresh(token).await?;
    Ok(ApiMessage::new("Token refreshed", session.tokens).into_response())
}

/// `GET /api/user/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let user = state.auth_service().me(&user.id).await?;
    Ok(ApiMessage::new("OK", UserBody { user }).into_response())
}

/// `PUT /api/user/update`
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .auth_service()
        .update_profile(&user.id, payload.into())
        .await?;
    Ok(ApiMessage::new("User updated", UserBody { user }).into_response())
}

/// `POST /api/user/change-password`
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    let message = "oldPassword and newPassword required";
    let old_password = require_present(payload.old_password.as_deref(), message)?;
    let new_password = require_present(payload.new_password.as_deref(), message)?;

    state
        .auth_service()
        .change_password(&user.id, old_password, new_password)
        .await?;
    Ok(ApiMessage::only("Password changed").into_response())
}

/// `POST /api/user/toggle-2fa`
pub async fn toggle_two_factor(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let user = state.auth_service().toggle_two_factor(&user.id).await?;
    Ok(ApiMessage::new(
        "2FA flag toggled",
        TwoFactorBody {
            two_factor_enabled: user.two_factor_enabled,
        },
    )
    .into_response())
}

/// `POST /api/user/forgot-password`. Answers the same way whether or not
/// the address belongs to an account.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    let email = require_present(payload.email.as_deref(), "Email required")?;
    let dev_token = state.auth_service().forgot_password(email).await?;

    Ok(ApiMessage::new(
        "If the email exists, a reset link has been sent.",
        ForgotPasswordBody { dev_token },
    )
    .into_response())
}

/// `POST /api/user/reset-password`
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let message = "Token and newPassword required";
    let token = require_present(payload.token.as_deref(), message)?;
    let new_password = require_present(payload.new_password.as_deref(), message)?;

    state
        .auth_service()
        .reset_password(token, new_password)
        .await?;
    Ok(ApiMessage::only("Password reset").into_response())
}

/// `DELETE /api/user/users/{id}` (admin)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "User")?;
    state.user_admin_service().delete(&user.id, id).await?;
    Ok(ApiMessage::only("User deleted").into_response())
}

/// `GET /api/user/stats` (agent dashboard)
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let stats = state.stats_service().agent_dashboard(&user.id).await?;
    Ok(ApiMessage::new("Dashboard stats retrieved", super::StatsBody { stats }).into_response())
}
