//! Domain service for the template catalogue.

use serde::Serialize;
use thiserror::Error;

use crate::db::{TemplateChanges, TemplateFilter};
use crate::models::{Template, TemplateType};
use crate::services::uploads::{UploadError, UploadedFile};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found")]
    NotFound,

    /// Still referenced by requests.
    #[error("Cannot delete template. It is used in {0} request(s)")]
    InUse(u64),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for TemplateError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for TemplateError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
pub struct CreateTemplate {
    pub title: String,
    pub category: String,
    pub template_type: TemplateType,
    pub canva_url: Option<String>,
    /// Uploaded preview; wins over `preview_url`.
    pub preview: Option<UploadedFile>,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplate {
    pub changes: TemplateChanges,
    pub preview: Option<UploadedFile>,
}

#[derive(Debug, Clone)]
pub struct BulkTemplates {
    pub category: String,
    pub template_type: TemplateType,
    pub title_prefix: Option<String>,
    pub canva_url: Option<String>,
    pub previews: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub created: Vec<Template>,
    /// Titles that already existed for the category and type.
    pub skipped: Vec<String>,
}

/// Title for the `index`-th (0-based) file of a bulk upload.
#[must_use]
pub fn bulk_title(prefix: Option<&str>, index: usize, file: &UploadedFile) -> String {
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix} {}", index + 1),
        None => file.base_name(),
    }
}

#[async_trait::async_trait]
pub trait TemplateService: Send + Sync {
    /// Newest first.
    async fn list(&self, filter: TemplateFilter) -> Result<Vec<Template>, TemplateError>;

    async fn get(&self, id: &str) -> Result<Template, TemplateError>;

    async fn create(&self, input: CreateTemplate) -> Result<Template, TemplateError>;

    async fn update(&self, id: &str, input: UpdateTemplate) -> Result<Template, TemplateError>;

    /// # Errors
    ///
    /// Returns [`TemplateError::InUse`] while any request references it.
    async fn delete(&self, id: &str) -> Result<(), TemplateError>;

    async fn categories(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<String>, TemplateError>;

    /// One template per preview file. Existing (title, category, type)
    /// combinations are skipped rather than duplicated.
    async fn bulk_create(&self, input: BulkTemplates) -> Result<BulkOutcome, TemplateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn preview(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn test_bulk_title_with_prefix_is_one_based() {
        assert_eq!(bulk_title(Some("Open House"), 0, &preview("x.png")), "Open House 1");
        assert_eq!(bulk_title(Some("Open House "), 4, &preview("x.png")), "Open House 5");
    }

    #[test]
    fn test_bulk_title_falls_back_to_file_name() {
        assert_eq!(bulk_title(None, 0, &preview("Just Listed.png")), "Just Listed");
        assert_eq!(bulk_title(Some("  "), 0, &preview("Sold.jpg")), "Sold");
    }

    #[test]
    fn test_in_use_message() {
        assert_eq!(
            TemplateError::InUse(1).to_string(),
            "Cannot delete template. It is used in 1 request(s)"
        );
    }
}
