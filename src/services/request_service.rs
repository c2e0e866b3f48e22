//! Domain service for the request lifecycle: submission by agents,
//! fulfilment by VAs and admins, and the files passed between them.

use thiserror::Error;

use crate::db::StatusCounts;
use crate::models::{CurrentUser, Request, RequestFile, RequestStatus};
use crate::services::uploads::{UploadError, UploadedFile};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request not found")]
    NotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("File not found")]
    FileNotFound,

    #[error("File does not belong to this request")]
    FileMismatch,

    #[error("You do not have access to this request")]
    Forbidden,

    #[error("Status cannot change from {from} to {to}")]
    TransitionNotAllowed {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RequestError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RequestError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub template_id: String,
    pub project_title: String,
    /// `YYYY-MM-DD` or RFC 3339
    pub deadline: String,
    pub platforms: Vec<String>,
    pub dimensions: Option<String>,
    pub notes: Option<String>,
    /// Files already uploaded elsewhere.
    pub file_urls: Vec<String>,
    pub uploads: Vec<UploadedFile>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub project_title: Option<String>,
    pub deadline: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub dimensions: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttachFile {
    pub upload: Option<UploadedFile>,
    pub file_url: Option<String>,
    /// Defaults to `va_completed`.
    pub file_type: Option<String>,
}

/// Trims every tag and drops the empty ones.
#[must_use]
pub fn clean_platforms(platforms: Vec<String>) -> Vec<String> {
    platforms
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[async_trait::async_trait]
pub trait RequestService: Send + Sync {
    /// Agents only ever see their own requests; staff see everything.
    async fn list(
        &self,
        actor: &CurrentUser,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, RequestError>;

    async fn get(&self, actor: &CurrentUser, id: &str) -> Result<Request, RequestError>;

    /// Validates, stores any uploads, persists the request with status `new`
    /// and queues the new-request notification.
    async fn create(&self, actor: &CurrentUser, input: CreateRequest)
    -> Result<Request, RequestError>;

    async fn update(
        &self,
        actor: &CurrentUser,
        id: &str,
        input: UpdateRequest,
    ) -> Result<Request, RequestError>;

    /// Moving to `completed` queues the completion notification, even when
    /// the request was already completed.
    async fn update_status(
        &self,
        actor: &CurrentUser,
        id: &str,
        status: RequestStatus,
    ) -> Result<Request, RequestError>;

    async fn attach_file(
        &self,
        actor: &CurrentUser,
        id: &str,
        input: AttachFile,
    ) -> Result<RequestFile, RequestError>;

    async fn delete_file(
        &self,
        actor: &CurrentUser,
        id: &str,
        file_id: &str,
    ) -> Result<(), RequestError>;

    async fn stats(&self, actor: &CurrentUser) -> Result<StatusCounts, RequestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_platforms() {
        let cleaned = clean_platforms(vec![
            " instagram ".to_string(),
            String::new(),
            "   ".to_string(),
            "facebook".to_string(),
        ]);
        assert_eq!(cleaned, vec!["instagram", "facebook"]);
    }
}
