//! Request lifecycle endpoints under `/api/request`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery, FormData};
use super::validation::{parse_status, validate_id};
use super::{ApiError, ApiMessage, AppState, StatsBody};
use crate::db::StatusCounts;
use crate::models::{CurrentUser, Request, RequestFile};
use crate::services::{AttachFile, CreateRequest, UpdateRequest};

/// Multipart field carrying files submitted with a new request.
pub const ATTACHMENTS_FIELD: &str = "files";
/// Multipart field carrying a single attached file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestBody {
    pub request: Request,
}

#[derive(Debug, Serialize)]
pub struct RequestListBody {
    pub requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
pub struct FileBody {
    pub file: RequestFile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCounts {
    pub total: u64,
    pub by_status: StatusCounts,
}

/// `GET /api/request`
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<RequestQuery>,
) -> Result<Response, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .transpose()?;

    let requests = state.request_service().list(&user, status).await?;
    Ok(ApiMessage::new("Requests retrieved", RequestListBody { requests }).into_response())
}

/// `GET /api/request/stats`
pub async fn request_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let by_status = state.request_service().stats(&user).await?;
    let stats = RequestCounts {
        total: by_status.total(),
        by_status,
    };
    Ok(ApiMessage::new("Stats retrieved", StatsBody { stats }).into_response())
}

/// `GET /api/request/{id}`
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Request")?;
    let request = state.request_service().get(&user, id).await?;
    Ok(ApiMessage::new("Request retrieved", RequestBody { request }).into_response())
}

/// `POST /api/request` (agent). JSON, or multipart with `files`.
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut form: FormData,
) -> Result<Response, ApiError> {
    let input = CreateRequest {
        template_id: form.owned("templateId").unwrap_or_default(),
        project_title: form.owned("projectTitle").unwrap_or_default(),
        deadline: form.owned("deadline").unwrap_or_default(),
        platforms: form.list("platforms").unwrap_or_default(),
        dimensions: form.owned("dimensions"),
        notes: form.owned("notes"),
        file_urls: form.list("fileUrls").unwrap_or_default(),
        uploads: form.take_files(ATTACHMENTS_FIELD),
    };

    let request = state.request_service().create(&user, input).await?;
    Ok(ApiMessage::new("Request submitted", RequestBody { request }).created())
}

/// `PUT /api/request/{id}`: owner agent or staff.
pub async fn update_request(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: FormData,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Request")?;
    let input = UpdateRequest {
        project_title: form.raw("projectTitle"),
        deadline: form.raw("deadline"),
        platforms: form.list("platforms"),
        dimensions: form.raw("dimensions"),
        notes: form.raw("notes"),
    };

    let request = state.request_service().update(&user, id, input).await?;
    Ok(ApiMessage::new("Request updated", RequestBody { request }).into_response())
}

/// `PUT /api/request/{id}/status` (staff)
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<StatusUpdate>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Request")?;
    let status = parse_status(payload.status.as_deref().unwrap_or_default())?;

    let request = state
        .request_service()
        .update_status(&user, id, status)
        .await?;
    Ok(ApiMessage::new("Request status updated", RequestBody { request }).into_response())
}

/// `POST /api/request/{id}/files` (staff). Multipart `file`, or a
/// `fileUrl` pointing at an existing upload.
pub async fn attach_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut form: FormData,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Request")?;
    let input = AttachFile {
        upload: form.take_file(FILE_FIELD),
        file_url: form.owned("fileUrl"),
        file_type: form.owned("fileType"),
    };

    let file = state.request_service().attach_file(&user, id, input).await?;
    Ok(ApiMessage::new("File uploaded", FileBody { file }).created())
}

/// `DELETE /api/request/{id}/files/{file_id}`: staff or the owning agent.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Request")?;
    let file_id = validate_id(&file_id, "File")?;

    state.request_service().delete_file(&user, id, file_id).await?;
    Ok(ApiMessage::only("File deleted").into_response())
}
