//! Template registry endpoints under `/api/template`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiQuery, FormData};
use super::validation::{parse_template_type, require_present, validate_id};
use super::{ApiError, ApiMessage, AppState};
use crate::db::{TemplateChanges, TemplateFilter};
use crate::models::Template;
use crate::services::{BulkTemplates, CreateTemplate, UpdateTemplate};

/// Multipart field carrying the preview image.
pub const PREVIEW_FIELD: &str = "preview";
/// Multipart field carrying the images of a bulk upload.
pub const BULK_FIELD: &str = "previews";

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplateBody {
    pub template: Template,
}

#[derive(Debug, Serialize)]
pub struct TemplateListBody {
    pub templates: Vec<Template>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesBody {
    pub categories: Vec<String>,
}

fn type_filter(raw: Option<&str>) -> Result<Option<crate::models::TemplateType>, ApiError> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_template_type)
        .transpose()
}

/// `GET /api/template`
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TemplateQuery>,
) -> Result<Response, ApiError> {
    let filter = TemplateFilter {
        category: query
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        template_type: type_filter(query.template_type.as_deref())?,
    };

    let templates = state.template_service().list(filter).await?;
    Ok(ApiMessage::new("Templates retrieved", TemplateListBody { templates }).into_response())
}

/// `GET /api/template/categories`
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TemplateQuery>,
) -> Result<Response, ApiError> {
    let template_type = type_filter(query.template_type.as_deref())?;
    let categories = state.template_service().categories(template_type).await?;
    Ok(ApiMessage::new("Categories retrieved", CategoriesBody { categories }).into_response())
}

/// `GET /api/template/{id}`
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Template")?;
    let template = state.template_service().get(id).await?;
    Ok(ApiMessage::new("Template retrieved", TemplateBody { template }).into_response())
}

/// `POST /api/template` (admin). JSON or multipart with a `preview` image.
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    mut form: FormData,
) -> Result<Response, ApiError> {
    let required = "Title, category, and type are required";
    let title = require_present(form.text("title"), required)?.to_string();
    let category = require_present(form.text("category"), required)?.to_string();
    let template_type = parse_template_type(require_present(form.text("type"), required)?)?;

    let template = state
        .template_service()
        .create(CreateTemplate {
            title,
            category,
            template_type,
            canva_url: form.owned("canvaUrl"),
            preview_url: form.owned("previewUrl"),
            preview: form.take_file(PREVIEW_FIELD),
        })
        .await?;

    Ok(ApiMessage::new("Template created", TemplateBody { template }).created())
}

/// `PUT /api/template/{id}` (admin). Only the fields present change.
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut form: FormData,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Template")?;

    let template_type = form
        .raw("type")
        .as_deref()
        .map(parse_template_type)
        .transpose()?;
    let changes = TemplateChanges {
        title: form.raw("title"),
        category: form.raw("category"),
        template_type,
        canva_url: form.raw("canvaUrl"),
        preview_url: form.raw("previewUrl"),
    };

    let template = state
        .template_service()
        .update(
            id,
            UpdateTemplate {
                changes,
                preview: form.take_file(PREVIEW_FIELD),
            },
        )
        .await?;

    Ok(ApiMessage::new("Template updated", TemplateBody { template }).into_response())
}

/// `DELETE /api/template/{id}` (admin). Refused while requests use it.
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = validate_id(&id, "Template")?;
    state.template_service().delete(id).await?;
    Ok(ApiMessage::only("Template deleted").into_response())
}

/// `POST /api/template/bulk` (admin, multipart)
pub async fn bulk_create_templates(
    State(state): State<Arc<AppState>>,
    mut form: FormData,
) -> Result<Response, ApiError> {
    let required = "Category and type are required";
    let category = require_present(form.text("category"), required)?.to_string();
    let template_type = parse_template_type(require_present(form.text("type"), required)?)?;

    let previews = form.take_files(BULK_FIELD);
    if previews.is_empty() {
        return Err(ApiError::validation("At least one preview image is required"));
    }

    let outcome = state
        .template_service()
        .bulk_create(BulkTemplates {
            category,
            template_type,
            title_prefix: form.owned("titlePrefix"),
            canva_url: form.owned("canvaUrl"),
            previews,
        })
        .await?;

    let message = format!(
        "{} template(s) created, {} skipped",
        outcome.created.len(),
        outcome.skipped.len()
    );
    Ok(ApiMessage::new(message, outcome).created())
}
